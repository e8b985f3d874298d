pub mod openai;

pub use openai::OpenAiClient;

use crate::error::LlmError;

/// Text-in/text-out model. Implementations must not retry internally; the repair
/// engine decides when to ask again.
pub trait LanguageModel {
    fn generate(&mut self, prompt: &str) -> Result<String, LlmError>;
}

impl<M: LanguageModel + ?Sized> LanguageModel for &mut M {
    fn generate(&mut self, prompt: &str) -> Result<String, LlmError> {
        (**self).generate(prompt)
    }
}

impl<M: LanguageModel + ?Sized> LanguageModel for Box<M> {
    fn generate(&mut self, prompt: &str) -> Result<String, LlmError> {
        (**self).generate(prompt)
    }
}
