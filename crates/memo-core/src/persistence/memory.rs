use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::PersistenceError;
use crate::types::{Memo, MemoForm, MemoSummary};

use super::{apply_patch, sort_newest_first, MemoRepository};

/// Process-local memo tables. Contents are lost on exit.
#[derive(Default)]
pub struct InMemoryRepository {
    memos: RwLock<Vec<Memo>>,
    summaries: RwLock<Vec<MemoSummary>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored summaries across all memos.
    pub async fn summary_count(&self) -> usize {
        self.summaries.read().await.len()
    }
}

#[async_trait]
impl MemoRepository for InMemoryRepository {
    async fn list(&self) -> Result<Vec<Memo>, PersistenceError> {
        let mut memos = self.memos.read().await.clone();
        sort_newest_first(&mut memos);
        Ok(memos)
    }

    async fn insert(&self, memo: &Memo) -> Result<Memo, PersistenceError> {
        let mut memos = self.memos.write().await;
        if memos.iter().any(|m| m.id == memo.id) {
            return Err(PersistenceError::Other(format!(
                "duplicate key value: {}",
                memo.id
            )));
        }
        memos.push(memo.clone());
        Ok(memo.clone())
    }

    async fn update(
        &self,
        id: &str,
        form: &MemoForm,
        updated_at: DateTime<Utc>,
    ) -> Result<Memo, PersistenceError> {
        let mut memos = self.memos.write().await;
        let memo = memos
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        apply_patch(memo, form, updated_at);
        Ok(memo.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        self.memos.write().await.retain(|m| m.id != id);
        Ok(())
    }

    async fn insert_summary(&self, summary: &MemoSummary) -> Result<(), PersistenceError> {
        self.summaries.write().await.push(summary.clone());
        Ok(())
    }

    async fn latest_summary(&self, memo_id: &str) -> Result<Option<MemoSummary>, PersistenceError> {
        // max_by keeps the last of equal elements, so same-instant inserts resolve to the newest
        Ok(self
            .summaries
            .read()
            .await
            .iter()
            .filter(|s| s.memo_id == memo_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at))
            .cloned())
    }
}
