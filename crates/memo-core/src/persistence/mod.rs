//! Persistence gateway: durable memo and summary tables.
//!
//! The Memo Store only talks to [`MemoRepository`]. Three backends exist:
//! the hosted PostgREST tables ([`rest::RestMemoRepository`]), local JSON
//! files ([`file::FileMemoRepository`]) and process memory
//! ([`memory::InMemoryRepository`]).

pub mod memory;
pub mod rest;
#[cfg(feature = "file-backend")]
pub mod file;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{BackendKind, Config};
use crate::error::PersistenceError;
use crate::types::{Category, Memo, MemoForm, MemoSummary};

/// Trait for memo storage backends.
#[async_trait]
pub trait MemoRepository: Send + Sync {
    /// All memos, newest `created_at` first.
    async fn list(&self) -> Result<Vec<Memo>, PersistenceError>;

    /// Insert a new record and return the stored copy.
    async fn insert(&self, memo: &Memo) -> Result<Memo, PersistenceError>;

    /// Overwrite the editable fields of `id`. `NotFound` when no such record exists.
    async fn update(
        &self,
        id: &str,
        form: &MemoForm,
        updated_at: DateTime<Utc>,
    ) -> Result<Memo, PersistenceError>;

    /// Delete a record.
    async fn delete(&self, id: &str) -> Result<(), PersistenceError>;

    /// Append a generated summary.
    async fn insert_summary(&self, summary: &MemoSummary) -> Result<(), PersistenceError>;

    /// Most recently created summary for a memo.
    async fn latest_summary(&self, memo_id: &str) -> Result<Option<MemoSummary>, PersistenceError>;
}

/// Build the repository selected by `config.persistence`.
pub fn create_repository(config: &Config) -> Result<Arc<dyn MemoRepository>, PersistenceError> {
    let persistence = &config.persistence;
    match persistence.resolved_backend() {
        BackendKind::Rest => {
            info!("Using hosted memo store at {}", persistence.url);
            Ok(Arc::new(rest::RestMemoRepository::new(
                &persistence.url,
                &persistence.api_key,
                &persistence.memos_table,
                &persistence.summaries_table,
            )))
        }
        #[cfg(feature = "file-backend")]
        BackendKind::File | BackendKind::Auto => {
            let dir = config.data_dir();
            info!("Using file memo store in {}", dir.display());
            Ok(Arc::new(file::FileMemoRepository::open(&dir)?))
        }
        #[cfg(not(feature = "file-backend"))]
        BackendKind::File | BackendKind::Auto => {
            tracing::warn!("File backend not compiled in, falling back to in-memory store");
            Ok(Arc::new(memory::InMemoryRepository::new()))
        }
        BackendKind::Memory => {
            info!("Using in-memory memo store");
            Ok(Arc::new(memory::InMemoryRepository::new()))
        }
    }
}

/// Row shape of the `memos` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MemoRow> for Memo {
    fn from(row: MemoRow) -> Self {
        Memo {
            id: row.id,
            title: row.title,
            content: row.content,
            category: Category::parse(&row.category),
            tags: row.tags.unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&Memo> for MemoRow {
    fn from(memo: &Memo) -> Self {
        MemoRow {
            id: memo.id.clone(),
            title: memo.title.clone(),
            content: memo.content.clone(),
            category: memo.category.as_str().to_string(),
            tags: Some(memo.tags.clone()),
            created_at: memo.created_at,
            updated_at: memo.updated_at,
        }
    }
}

/// Column values written by an update.
#[derive(Debug, Clone, Serialize)]
pub struct MemoPatchRow<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub category: &'static str,
    pub tags: &'a [String],
    pub updated_at: DateTime<Utc>,
}

impl<'a> MemoPatchRow<'a> {
    pub fn new(form: &'a MemoForm, updated_at: DateTime<Utc>) -> Self {
        Self {
            title: &form.title,
            content: &form.content,
            category: form.category.as_str(),
            tags: &form.tags,
            updated_at,
        }
    }
}

/// Row shape of the `memo_summaries` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoSummaryRow {
    pub id: String,
    pub memo_id: String,
    pub summary: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<MemoSummaryRow> for MemoSummary {
    fn from(row: MemoSummaryRow) -> Self {
        MemoSummary {
            id: row.id,
            memo_id: row.memo_id,
            summary: row.summary,
            model: row.model.unwrap_or_default(),
            meta: row.meta,
            created_at: row.created_at,
        }
    }
}

impl From<&MemoSummary> for MemoSummaryRow {
    fn from(summary: &MemoSummary) -> Self {
        MemoSummaryRow {
            id: summary.id.clone(),
            memo_id: summary.memo_id.clone(),
            summary: summary.summary.clone(),
            model: Some(summary.model.clone()),
            meta: summary.meta.clone(),
            created_at: summary.created_at,
        }
    }
}

/// Apply an update to a stored record in place.
pub(crate) fn apply_patch(memo: &mut Memo, form: &MemoForm, updated_at: DateTime<Utc>) {
    memo.title = form.title.clone();
    memo.content = form.content.clone();
    memo.category = form.category;
    memo.tags = form.tags.clone();
    memo.updated_at = updated_at;
}

/// Sort newest first by `created_at`.
pub(crate) fn sort_newest_first(memos: &mut [Memo]) {
    memos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
pub(crate) mod testing {
    //! Failure-injecting repository for store and service tests.

    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::persistence::memory::InMemoryRepository;

    #[derive(Default)]
    pub struct FlakyRepository {
        pub inner: InMemoryRepository,
        pub fail_list: AtomicBool,
        pub fail_insert: AtomicBool,
        pub fail_update: AtomicBool,
        pub fail_summary_insert: AtomicBool,
        pub fail_summary_read: AtomicBool,
        pub fail_delete_ids: Mutex<HashSet<String>>,
    }

    impl FlakyRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_delete_of(&self, id: &str) {
            self.fail_delete_ids.lock().unwrap().insert(id.to_string());
        }

        fn check(flag: &AtomicBool, what: &str) -> Result<(), PersistenceError> {
            if flag.load(Ordering::SeqCst) {
                Err(PersistenceError::Api {
                    status: 503,
                    message: format!("{} unavailable", what),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl MemoRepository for FlakyRepository {
        async fn list(&self) -> Result<Vec<Memo>, PersistenceError> {
            Self::check(&self.fail_list, "list")?;
            self.inner.list().await
        }

        async fn insert(&self, memo: &Memo) -> Result<Memo, PersistenceError> {
            Self::check(&self.fail_insert, "insert")?;
            self.inner.insert(memo).await
        }

        async fn update(
            &self,
            id: &str,
            form: &MemoForm,
            updated_at: DateTime<Utc>,
        ) -> Result<Memo, PersistenceError> {
            Self::check(&self.fail_update, "update")?;
            self.inner.update(id, form, updated_at).await
        }

        async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
            if self.fail_delete_ids.lock().unwrap().contains(id) {
                return Err(PersistenceError::Api {
                    status: 503,
                    message: format!("delete of {} failed", id),
                });
            }
            self.inner.delete(id).await
        }

        async fn insert_summary(&self, summary: &MemoSummary) -> Result<(), PersistenceError> {
            Self::check(&self.fail_summary_insert, "summary insert")?;
            self.inner.insert_summary(summary).await
        }

        async fn latest_summary(&self, memo_id: &str) -> Result<Option<MemoSummary>, PersistenceError> {
            Self::check(&self.fail_summary_read, "summary read")?;
            self.inner.latest_summary(memo_id).await
        }
    }
}
