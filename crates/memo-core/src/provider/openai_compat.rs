use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::ProviderError;
use crate::types::GenerationConfig;
use crate::util::http;

use super::{non_empty, LlmProvider};

/// OpenAI-compatible provider.
/// Works with OpenAI, OpenRouter, vLLM and any other `chat/completions` API.
pub struct OpenAiCompatProvider {
    api_key: String,
    api_base: String,
}

impl OpenAiCompatProvider {
    /// Without an explicit `api_base`, `model` picks between OpenRouter and OpenAI.
    pub fn new(api_key: String, api_base: Option<String>, model: &str) -> Self {
        let base = api_base.unwrap_or_else(|| {
            if model.to_lowercase().contains("openrouter") {
                "https://openrouter.ai/api/v1".to_string()
            } else {
                "https://api.openai.com/v1".to_string()
            }
        });

        Self {
            api_key,
            api_base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Normalize model name for the API (strip provider prefixes).
    fn normalize_model(&self, model: &str) -> String {
        model
            .strip_prefix("openrouter/")
            .or_else(|| model.strip_prefix("openai/"))
            .unwrap_or(model)
            .to_string()
    }

    fn build_body(model: &str, prompt: &str, config: &GenerationConfig) -> serde_json::Value {
        json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": config.max_output_tokens,
            "temperature": config.temperature,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        config: &GenerationConfig,
    ) -> Result<Option<String>, ProviderError> {
        let url = format!("{}/chat/completions", self.api_base);
        let model_name = self.normalize_model(model);

        debug!("OpenAI-compat request to {} with model {}", url, model_name);

        let response = http::client()
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&Self::build_body(&model_name, prompt, config))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let data: serde_json::Value = response.json().await?;
        parse_openai_response(&data)
    }
}

/// Extract the first choice's message content from an OpenAI-format response.
pub fn parse_openai_response(data: &serde_json::Value) -> Result<Option<String>, ProviderError> {
    let choice = data
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| ProviderError::Parse("No choices in response".to_string()))?;

    let message = choice
        .get("message")
        .ok_or_else(|| ProviderError::Parse("No message in choice".to_string()))?;

    Ok(message
        .get("content")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .and_then(non_empty))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base() {
        let p = OpenAiCompatProvider::new("k".into(), None, "gpt-4o-mini");
        assert_eq!(p.api_base, "https://api.openai.com/v1");
        let p = OpenAiCompatProvider::new("k".into(), None, "openrouter/google/gemma");
        assert_eq!(p.api_base, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn test_normalize_model() {
        let p = OpenAiCompatProvider::new("k".into(), None, "gpt-4o");
        assert_eq!(p.normalize_model("openrouter/meta/llama"), "meta/llama");
        assert_eq!(p.normalize_model("openai/gpt-4o"), "gpt-4o");
        assert_eq!(p.normalize_model("gpt-4o"), "gpt-4o");
    }

    #[test]
    fn test_build_body() {
        let config = GenerationConfig { temperature: 0.7, max_output_tokens: 500 };
        let body = OpenAiCompatProvider::build_body("gpt-4o", "summarize", &config);
        assert_eq!(body["messages"][0]["content"], "summarize");
        assert_eq!(body["max_tokens"], 500);
    }

    #[test]
    fn test_parse_content() {
        let data = json!({
            "choices": [{ "message": { "role": "assistant", "content": "A short summary." } }]
        });
        assert_eq!(
            parse_openai_response(&data).unwrap(),
            Some("A short summary.".to_string())
        );
    }

    #[test]
    fn test_parse_null_content() {
        let data = json!({ "choices": [{ "message": { "content": null } }] });
        assert_eq!(parse_openai_response(&data).unwrap(), None);
    }

    #[test]
    fn test_parse_missing_choices() {
        assert!(parse_openai_response(&json!({})).is_err());
    }
}
