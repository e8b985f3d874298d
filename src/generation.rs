use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{RequestError, WorksheetError};
use crate::llm::LanguageModel;
use crate::parsing::cleaner::clean_lesson_text;
use crate::parsing::sections::parse_lesson_sections;
use crate::prompts::{
    build_constrained_retry_prompt, build_grammar_lesson_prompt,
    build_multi_rule_grammar_lesson_prompt,
};
use crate::repair::ActivityRepairer;
use crate::types::worksheet_data::{
    ExpectedCounts, RepairOutcome, ValidationResult, MAX_QUESTIONS_PER_SECTION,
    MIN_QUESTIONS_PER_SECTION,
};
use crate::validation::{validate_counts, validate_lesson_content};

pub const MIN_GRADE: u32 = 1;
pub const MAX_GRADE: u32 = 12;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LessonRequest {
    pub grade: u32,
    pub subject: String,
    /// Comma-separated; the first entry scopes cleaning and repair.
    pub topic: String,
    pub questions_per_section: u32,
}

impl LessonRequest {
    pub fn topics(&self) -> Vec<String> {
        self.topic
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn expected_counts(&self) -> ExpectedCounts {
        ExpectedCounts::uniform(self.questions_per_section)
    }

    pub fn validate(&self) -> Result<Vec<String>, RequestError> {
        if !(MIN_GRADE..=MAX_GRADE).contains(&self.grade) {
            return Err(RequestError::GradeOutOfRange(self.grade));
        }
        if !(MIN_QUESTIONS_PER_SECTION..=MAX_QUESTIONS_PER_SECTION).contains(&self.questions_per_section) {
            return Err(RequestError::QuestionsOutOfRange(self.questions_per_section));
        }
        let topics = self.topics();
        if topics.is_empty() {
            return Err(RequestError::NoTopics);
        }
        Ok(topics)
    }
}

/// Result of cleaning, validating and repairing one worksheet.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NormalizedWorksheet {
    pub text: String,
    pub initial_validation: ValidationResult,
    pub final_validation: ValidationResult,
    pub repairs: Vec<RepairOutcome>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub lesson_text: String,
    pub topics: Vec<String>,
    pub regenerated: bool,
    pub warnings: Vec<String>,
    pub initial_validation: ValidationResult,
    pub final_validation: ValidationResult,
    pub repairs: Vec<RepairOutcome>,
}

fn log_validation(stage: &str, validation: &ValidationResult) {
    let s = &validation.summary;
    info!(
        ok = s.ok,
        total_activities = s.total_activities,
        matching_activities = s.matching_activities,
        total_expected = s.total_expected,
        total_actual = s.total_actual,
        "{} validation",
        stage
    );
}

/// Cleans raw model output, validates activity item counts and repairs each failing
/// activity in ordinal order. Never fails: the worst case is the cleaned text as is.
pub fn normalize_and_repair<M: LanguageModel>(
    repairer: &mut ActivityRepairer<M>,
    raw_text: &str,
    subject: &str,
    topic: &str,
    expected: &ExpectedCounts,
) -> NormalizedWorksheet {
    let cleaned = clean_lesson_text(raw_text, subject, topic);

    let initial_validation = validate_counts(&parse_lesson_sections(&cleaned), expected);
    log_validation("Initial", &initial_validation);
    for check in initial_validation.mismatched() {
        warn!("Activity {}: expected {}, got {}", check.ordinal, check.expected, check.actual);
    }

    if initial_validation.ok() {
        return NormalizedWorksheet {
            text: cleaned,
            final_validation: initial_validation.clone(),
            initial_validation,
            repairs: Vec::new(),
        };
    }

    info!("Fixing mismatched activities...");
    let mut text = cleaned;
    let mut repairs = Vec::new();
    for check in initial_validation.mismatched() {
        info!("Fixing Activity {}: {} -> {} items", check.ordinal, check.actual, check.expected);
        let outcome = repairer.repair(&text, topic, check.ordinal, check.expected);
        text = outcome.text.clone();
        repairs.push(outcome);
    }

    let final_validation = validate_counts(&parse_lesson_sections(&text), expected);
    log_validation("Final", &final_validation);
    for check in &final_validation.activities {
        if check.matches {
            info!("Activity {} fixed: {} items", check.ordinal, check.actual);
        } else {
            warn!(
                "Activity {} still mismatched: expected {}, got {}",
                check.ordinal, check.expected, check.actual
            );
        }
    }

    NormalizedWorksheet { text, initial_validation, final_validation, repairs }
}

/// Full worksheet generation: prompt, generate, content check with one constrained
/// regeneration, then [`normalize_and_repair`]. Only request validation and the
/// initial generation calls can fail.
pub fn generate_worksheet<M: LanguageModel>(
    model: M,
    request: &LessonRequest,
    max_repair_attempts: u32,
) -> Result<GenerationOutput, WorksheetError> {
    let topics = request.validate()?;
    let expected = request.expected_counts();
    let primary_topic = topics[0].clone();

    info!(
        "Generating lesson for grade {}, subject {}, topic {}",
        request.grade, request.subject, request.topic
    );

    let prompt = if topics.len() == 1 {
        build_grammar_lesson_prompt(&primary_topic, request.grade, &expected)
    } else {
        build_multi_rule_grammar_lesson_prompt(&topics, request.grade, &expected)
    };

    let mut repairer = ActivityRepairer::new(model).with_max_attempts(max_repair_attempts);

    info!("Calling model to generate lesson...");
    let mut lesson_text = repairer.model_mut().generate(&prompt)?;

    let (is_valid, mut warnings) = validate_lesson_content(&lesson_text, &primary_topic);
    let mut regenerated = false;
    if !is_valid {
        warn!("Lesson validation failed: {:?}. Regenerating with stronger constraints.", warnings);
        let stronger_prompt = build_constrained_retry_prompt(&prompt, &primary_topic);
        lesson_text = repairer.model_mut().generate(&stronger_prompt)?;
        regenerated = true;
        let (_, new_warnings) = validate_lesson_content(&lesson_text, &primary_topic);
        warnings = new_warnings;
    }
    info!("Lesson generated successfully");

    let normalized = normalize_and_repair(
        &mut repairer,
        &lesson_text,
        &request.subject,
        &primary_topic,
        &expected,
    );

    Ok(GenerationOutput {
        lesson_text: normalized.text,
        topics,
        regenerated,
        warnings,
        initial_validation: normalized.initial_validation,
        final_validation: normalized.final_validation,
        repairs: normalized.repairs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::types::worksheet_data::RepairMethod;
    use std::collections::VecDeque;

    struct QueueModel {
        responses: VecDeque<Result<String, LlmError>>,
    }

    impl QueueModel {
        fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self { responses: responses.into() }
        }
    }

    impl LanguageModel for QueueModel {
        fn generate(&mut self, _prompt: &str) -> Result<String, LlmError> {
            self.responses
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::MalformedResponse("exhausted".to_string())))
        }
    }

    fn raw_lesson(counts: [u32; 4]) -> String {
        let mut raw = String::from("**Rule 1: Nouns**\nNouns name people, places, and things. Nouns are everywhere.\n\n");
        for (idx, count) in counts.iter().enumerate() {
            raw.push_str(&format!("### Activity Section {}\n", ["A", "B", "C", "D"][idx]));
            raw.push_str("Instructions: Underline the noun.\n");
            for n in 1..=*count {
                raw.push_str(&format!("{}. Sentence {}.\n", n, n));
            }
            raw.push('\n');
        }
        raw
    }

    fn request(questions: u32) -> LessonRequest {
        LessonRequest {
            grade: 4,
            subject: "Grammar".to_string(),
            topic: "Nouns".to_string(),
            questions_per_section: questions,
        }
    }

    #[test]
    fn request_validation_rejects_bad_input() {
        let mut bad = request(6);
        bad.grade = 13;
        assert_eq!(bad.validate(), Err(RequestError::GradeOutOfRange(13)));

        let mut bad = request(0);
        bad.grade = 2;
        assert_eq!(bad.validate(), Err(RequestError::QuestionsOutOfRange(0)));

        let mut bad = request(6);
        bad.topic = " , ,".to_string();
        assert_eq!(bad.validate(), Err(RequestError::NoTopics));
    }

    #[test]
    fn topics_are_split_and_trimmed() {
        let mut req = request(6);
        req.topic = " Nouns , Verbs,,Adjectives ".to_string();
        assert_eq!(req.topics(), vec!["Nouns", "Verbs", "Adjectives"]);
    }

    #[test]
    fn well_formed_lesson_needs_no_repairs() {
        let model = QueueModel::new(vec![Ok(raw_lesson([3, 3, 3, 3]))]);
        let output = generate_worksheet(model, &request(3), 2).unwrap();

        assert!(!output.regenerated);
        assert!(output.warnings.is_empty());
        assert!(output.initial_validation.ok());
        assert!(output.final_validation.ok());
        assert!(output.repairs.is_empty());
        assert!(output.lesson_text.starts_with("Grammar — Nouns\n\nExplanation\n\n"));
    }

    #[test]
    fn short_activity_is_repaired_in_place() {
        let model = QueueModel::new(vec![
            Ok(raw_lesson([3, 1, 3, 3])),
            Ok("1. The hat.\n2. The cat.\n3. The mat.".to_string()),
        ]);
        let output = generate_worksheet(model, &request(3), 2).unwrap();

        assert!(!output.initial_validation.ok());
        assert!(output.final_validation.ok());
        assert_eq!(output.repairs.len(), 1);
        assert_eq!(output.repairs[0].ordinal, 2);
        assert_eq!(output.repairs[0].method, RepairMethod::Regenerated);
        assert!(output.lesson_text.contains("Activity 2\n1. The hat.\n2. The cat.\n3. The mat."));
    }

    #[test]
    fn off_topic_lesson_is_regenerated_once() {
        let model = QueueModel::new(vec![
            Ok("Draw a picture.".to_string()),
            Ok(raw_lesson([2, 2, 2, 2])),
        ]);
        let output = generate_worksheet(model, &request(2), 2).unwrap();

        assert!(output.regenerated);
        assert!(output.warnings.is_empty());
        assert!(output.final_validation.ok());
    }

    #[test]
    fn failed_initial_generation_is_an_error() {
        let model = QueueModel::new(vec![Err(LlmError::Status { status: 500, body: String::new() })]);
        let err = generate_worksheet(model, &request(6), 2).unwrap_err();
        assert!(matches!(err, WorksheetError::Llm(_)));
    }

    #[test]
    fn repair_failures_still_return_text() {
        let model = QueueModel::new(vec![Ok(raw_lesson([6, 6, 6, 2]))]);
        let output = generate_worksheet(model, &request(6), 2).unwrap();

        assert!(!output.final_validation.ok());
        assert_eq!(output.repairs.len(), 1);
        assert!(!output.repairs[0].succeeded);
        assert!(output.lesson_text.contains("Activity 4"));
    }
}
