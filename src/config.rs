use serde::Deserialize;
use std::fs;

use crate::error::ConfigError;
use crate::types::worksheet_data::{
    DEFAULT_QUESTIONS_PER_SECTION, MAX_QUESTIONS_PER_SECTION, MIN_QUESTIONS_PER_SECTION,
};

pub const DEFAULT_CONFIG_FILE: &str = "worksheets.toml";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub store: StoreConfig,
    pub generation: GenerationConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub api_key_env: String,
    /// No timeout is applied when absent.
    pub timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: "gpt-4".to_string(),
            temperature: 0.7,
            max_tokens: 1500,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: "lessons.json".to_string() }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub subject: String,
    pub questions_per_section: u32,
    pub max_repair_attempts: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            subject: "Grammar".to_string(),
            questions_per_section: DEFAULT_QUESTIONS_PER_SECTION,
            max_repair_attempts: crate::repair::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let questions = self.generation.questions_per_section;
        if !(MIN_QUESTIONS_PER_SECTION..=MAX_QUESTIONS_PER_SECTION).contains(&questions) {
            return Err(ConfigError::InvalidValue {
                field: "generation.questions_per_section",
                reason: format!(
                    "{} is outside {}..={}",
                    questions, MIN_QUESTIONS_PER_SECTION, MAX_QUESTIONS_PER_SECTION
                ),
            });
        }
        if self.generation.max_repair_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "generation.max_repair_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "llm.model",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

pub fn parse_config(contents: &str, origin: &str) -> Result<Config, ConfigError> {
    let config = toml::from_str::<Config>(contents).map_err(|source| ConfigError::Parse {
        path: origin.to_string(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

pub fn load_config_from_file(file_path: &str) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(file_path).map_err(|source| ConfigError::Read {
        path: file_path.to_string(),
        source,
    })?;
    parse_config(&contents, file_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("", "inline").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.generation.questions_per_section, 6);
        assert_eq!(config.generation.max_repair_attempts, 2);
        assert!(config.llm.timeout_secs.is_none());
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let config = parse_config(
            "[llm]\nmodel = \"gpt-4o-mini\"\ntimeout_secs = 45\n\n[generation]\nquestions_per_section = 8\n",
            "inline",
        )
        .unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.timeout_secs, Some(45));
        assert_eq!(config.llm.max_tokens, 1500);
        assert_eq!(config.generation.questions_per_section, 8);
        assert_eq!(config.store.path, "lessons.json");
    }

    #[test]
    fn out_of_range_questions_are_rejected() {
        let err = parse_config("[generation]\nquestions_per_section = 21\n", "inline").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { field: "generation.questions_per_section", .. }
        ));
    }

    #[test]
    fn zero_repair_attempts_are_rejected() {
        let err = parse_config("[generation]\nmax_repair_attempts = 0\n", "inline").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn malformed_toml_reports_origin() {
        let err = parse_config("[llm\nmodel = 1", "broken.toml").unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_config_from_file("/definitely/not/here/worksheets.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
