use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::LanguageModel;
use crate::config::LlmConfig;
use crate::error::LlmError;

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let mut builder = Client::builder();
        // reqwest's blocking client defaults to 30s; an unset timeout means none at all.
        builder = match config.timeout_secs {
            Some(secs) => builder.timeout(Duration::from_secs(secs)),
            None => builder.timeout(None::<Duration>),
        };
        let client = builder.build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Reads the API key from the environment variable named in `config.api_key_env`.
    pub fn from_env(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config, api_key)
    }

    pub fn build_payload(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

pub fn parse_completion(response_data: &Value) -> Result<String, LlmError> {
    response_data["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            LlmError::MalformedResponse("missing choices[0].message.content".to_string())
        })
}

impl LanguageModel for OpenAiClient {
    fn generate(&mut self, prompt: &str) -> Result<String, LlmError> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "Sending completion request");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.build_payload(prompt))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let data: Value = response
            .json()
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
        parse_completion(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_model_settings() {
        let client = OpenAiClient::new(&LlmConfig::default(), "sk-test".to_string()).unwrap();
        let payload = client.build_payload("Write a worksheet");
        assert_eq!(payload["model"], "gpt-4");
        assert_eq!(payload["max_tokens"], 1500);
        assert_eq!(payload["messages"][0]["role"], "user");
        assert_eq!(payload["messages"][0]["content"], "Write a worksheet");
        assert!((payload["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn completion_content_is_extracted() {
        let data = json!({ "choices": [ { "message": { "role": "assistant", "content": "1. a" } } ] });
        assert_eq!(parse_completion(&data).unwrap(), "1. a");
    }

    #[test]
    fn missing_content_is_malformed() {
        let data = json!({ "choices": [] });
        assert!(matches!(parse_completion(&data), Err(LlmError::MalformedResponse(_))));
    }

    #[test]
    fn missing_api_key_is_reported_by_variable_name() {
        let config = LlmConfig {
            api_key_env: "WORKSHEETS_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..LlmConfig::default()
        };
        let err = OpenAiClient::from_env(&config).unwrap_err();
        assert!(err.to_string().contains("WORKSHEETS_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
