//! Memo summaries: generate with the model, record them, read the latest back.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::AiConfig;
use crate::error::{ConfigError, MemoError, Result};
use crate::persistence::MemoRepository;
use crate::provider::LlmProvider;
use crate::types::{GenerationConfig, MemoSummary};

pub struct SummaryService {
    provider: Option<Arc<dyn LlmProvider>>,
    repository: Arc<dyn MemoRepository>,
    model: String,
    generation: GenerationConfig,
}

impl SummaryService {
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        repository: Arc<dyn MemoRepository>,
        ai: &AiConfig,
    ) -> Self {
        Self {
            provider,
            repository,
            model: ai.model.clone(),
            generation: GenerationConfig {
                temperature: ai.temperature,
                max_output_tokens: ai.summary_max_tokens,
            },
        }
    }

    /// Generate a summary for a memo and record it.
    ///
    /// A failure to record the summary is logged and does not fail the call.
    pub async fn summarize(
        &self,
        memo_id: &str,
        title: Option<&str>,
        content: &str,
    ) -> Result<String> {
        if content.trim().is_empty() {
            return Err(MemoError::validation("content is required"));
        }
        if memo_id.trim().is_empty() {
            return Err(MemoError::validation("memoId is required"));
        }
        let provider = self.provider.as_ref().ok_or(ConfigError::NoApiKey)?;
        let title = title.map(str::trim).filter(|t| !t.is_empty());

        debug!("Requesting summary for memo {} from {}", memo_id, self.model);
        let summary = provider
            .generate(&build_prompt(title, content), &self.model, &self.generation)
            .await?
            .filter(|text| !text.trim().is_empty())
            .ok_or(MemoError::EmptyReply)?;

        let meta = json!({
            "title": title,
            "hasTitle": title.is_some(),
            "contentLength": content.chars().count(),
        });
        let record = MemoSummary::new(memo_id, summary.clone(), self.model.clone(), meta);
        match self.repository.insert_summary(&record).await {
            Ok(()) => info!("Saved summary {} for memo {}", record.id, memo_id),
            Err(e) => warn!("Failed to save summary for memo {}: {}", memo_id, e),
        }

        Ok(summary)
    }

    /// Text of the most recent summary for `memo_id`. Read failures are logged
    /// and reported as `None`.
    pub async fn latest_summary(&self, memo_id: &str) -> Option<String> {
        match self.repository.latest_summary(memo_id).await {
            Ok(found) => found.map(|s| s.summary),
            Err(e) => {
                warn!("Failed to read latest summary for memo {}: {}", memo_id, e);
                None
            }
        }
    }
}

fn build_prompt(title: Option<&str>, content: &str) -> String {
    match title {
        Some(title) => format!(
            "Summarize the following memo concisely and clearly.\n\nTitle: {}\n\nContent:\n{}",
            title, content
        ),
        None => format!(
            "Summarize the following memo concisely and clearly.\n\n{}",
            content
        ),
    }
}
