pub mod openai_compat;
pub mod gemini;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::GenerationConfig;

/// Trait for text-generation providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a single completion for `prompt`.
    ///
    /// Returns `Ok(None)` when the provider answered but produced no text.
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        config: &GenerationConfig,
    ) -> Result<Option<String>, ProviderError>;
}

/// Models served by the Gemini API; every other name goes to the
/// OpenAI-compatible endpoint.
pub fn is_gemini_model(model: &str) -> bool {
    model.to_lowercase().contains("gemini")
}

/// Create the appropriate provider based on model name and config.
pub fn create_provider(api_key: &str, api_base: Option<&str>, model: &str) -> Box<dyn LlmProvider> {
    if is_gemini_model(model) {
        return Box::new(gemini::GeminiProvider::new(
            api_key.to_string(),
            api_base.map(|s| s.to_string()),
        ));
    }

    // Default: OpenAI-compatible provider
    Box::new(openai_compat::OpenAiCompatProvider::new(
        api_key.to_string(),
        api_base.map(|s| s.to_string()),
        model,
    ))
}

/// Collapse a provider reply to `None` when it carries no visible text.
pub(crate) fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
