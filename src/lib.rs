pub mod config;
pub mod error;
pub mod types {
    pub mod worksheet_data;
}
pub mod parsing {
    pub mod cleaner;
    pub mod sections;
}
pub mod llm;
pub mod prompts;
pub mod validation;
pub mod repair;
pub mod generation;
pub mod store;
pub mod render;

pub use config::Config;
pub use error::{Result, WorksheetError};
pub use generation::{generate_worksheet, normalize_and_repair, GenerationOutput, LessonRequest};
pub use llm::{LanguageModel, OpenAiClient};
pub use parsing::cleaner::clean_lesson_text;
pub use parsing::sections::{count_numbered_items, parse_lesson_sections, reassemble};
pub use repair::ActivityRepairer;
pub use store::{JsonLessonStore, LessonStore};
pub use types::worksheet_data::{ExpectedCounts, ParsedSections, RepairOutcome, ValidationResult};
pub use validation::validate_counts;
