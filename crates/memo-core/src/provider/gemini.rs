use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::json;
use tracing::debug;

use crate::error::ProviderError;
use crate::types::GenerationConfig;
use crate::util::http;

use super::{non_empty, LlmProvider};

/// Google Gemini API provider.
pub struct GeminiProvider {
    api_key: String,
    api_base: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, api_base: Option<String>) -> Self {
        let base = api_base
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string());
        Self {
            api_key,
            api_base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Normalize model name: strip "gemini/" prefix.
    fn normalize_model(&self, model: &str) -> String {
        model
            .strip_prefix("gemini/")
            .unwrap_or(model)
            .to_string()
    }

    fn build_body(prompt: &str, config: &GenerationConfig) -> serde_json::Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": prompt}]
            }],
            "generationConfig": {
                "maxOutputTokens": config.max_output_tokens,
                "temperature": config.temperature,
            },
        })
    }

    /// The key travels in a header so it never appears in the request URL.
    fn request(&self, model_name: &str, prompt: &str, config: &GenerationConfig) -> RequestBuilder {
        let url = format!("{}/models/{}:generateContent", self.api_base, model_name);
        http::client()
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&Self::build_body(prompt, config))
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        config: &GenerationConfig,
    ) -> Result<Option<String>, ProviderError> {
        let model_name = self.normalize_model(model);

        debug!("Gemini request with model {}", model_name);

        let response = self.request(&model_name, prompt, config).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let data: serde_json::Value = response.json().await?;
        parse_gemini_response(&data)
    }
}

/// Concatenate the text parts of the first candidate.
///
/// A response without candidates, or a candidate cut off before any text
/// (`finishReason` `SAFETY` or `MAX_TOKENS`), is an empty reply, not a parse
/// failure.
pub fn parse_gemini_response(data: &serde_json::Value) -> Result<Option<String>, ProviderError> {
    if let Some(err) = data.get("error") {
        let message = err
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
            .to_string();
        return Err(ProviderError::Parse(message));
    }

    let Some(candidate) = data.get("candidates").and_then(|v| v.get(0)) else {
        debug!("Gemini response has no candidates");
        return Ok(None);
    };

    let Some(parts) = candidate
        .get("content")
        .and_then(|v| v.get("parts"))
        .and_then(|v| v.as_array())
    else {
        debug!(
            "Gemini candidate has no parts (finishReason: {})",
            candidate.get("finishReason").and_then(|v| v.as_str()).unwrap_or("unknown")
        );
        return Ok(None);
    };

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
        .collect();

    Ok(non_empty(text))
}
