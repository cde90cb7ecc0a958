//! Tag suggestion: ask the model for keywords and parse its comma-separated reply.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::AiConfig;
use crate::error::{ConfigError, MemoError, Result};
use crate::provider::LlmProvider;
use crate::types::GenerationConfig;

/// Upper bound on tags returned by a single suggestion.
pub const MAX_SUGGESTED_TAGS: usize = 5;

const EXAMPLE_TAGS: &str = "React, 학습, 개발, 웹개발, 프론트엔드";

pub struct TagSuggester {
    provider: Option<Arc<dyn LlmProvider>>,
    model: String,
    generation: GenerationConfig,
}

impl TagSuggester {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, ai: &AiConfig) -> Self {
        Self {
            provider,
            model: ai.model.clone(),
            generation: GenerationConfig {
                temperature: ai.temperature,
                max_output_tokens: ai.tags_max_tokens,
            },
        }
    }

    /// Suggest up to [`MAX_SUGGESTED_TAGS`] tags for a memo.
    pub async fn suggest(&self, title: Option<&str>, content: &str) -> Result<Vec<String>> {
        if content.trim().is_empty() {
            return Err(MemoError::validation("content is required"));
        }
        let provider = self.provider.as_ref().ok_or(ConfigError::NoApiKey)?;

        let prompt = build_prompt(title, content);
        debug!("Requesting tag suggestions from {}", self.model);
        let reply = provider
            .generate(&prompt, &self.model, &self.generation)
            .await?
            .filter(|text| !text.trim().is_empty())
            .ok_or(MemoError::EmptyReply)?;

        let tags = parse_tags(&reply);
        if tags.is_empty() {
            return Err(MemoError::NoTagsExtracted);
        }
        info!("Suggested {} tags", tags.len());
        Ok(tags)
    }
}

fn build_prompt(title: Option<&str>, content: &str) -> String {
    let mut prompt = format!(
        "Analyze the following memo and suggest fitting tags. Return at most {} tags \
         separated by commas. Tags may be written in Korean or English and should \
         reflect the key terms of the memo.\n\n",
        MAX_SUGGESTED_TAGS
    );
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => {
            prompt.push_str(&format!("Title: {}\n\nContent:\n{}\n\n", title, content));
        }
        None => {
            prompt.push_str(content);
            prompt.push_str("\n\n");
        }
    }
    prompt.push_str(&format!("Return only the tags (e.g. {})", EXAMPLE_TAGS));
    prompt
}

/// Split a model reply into tags: comma separated, trimmed, no empties,
/// case-sensitive duplicates dropped, capped at [`MAX_SUGGESTED_TAGS`].
pub fn parse_tags(reply: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for piece in reply.split(',') {
        let tag = piece.trim();
        if tag.is_empty() || tags.iter().any(|t| t == tag) {
            continue;
        }
        tags.push(tag.to_string());
        if tags.len() == MAX_SUGGESTED_TAGS {
            break;
        }
    }
    tags
}

/// Append suggestions after `existing`, skipping exact duplicates.
pub fn merge_tags(existing: &[String], suggested: &[String]) -> Vec<String> {
    let mut merged = existing.to_vec();
    for tag in suggested {
        if !merged.contains(tag) {
            merged.push(tag.clone());
        }
    }
    merged
}
