use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::PersistenceError;
use crate::types::{Memo, MemoForm, MemoSummary};
use crate::util::ensure_dir;

use super::{apply_patch, sort_newest_first, MemoRepository, MemoRow, MemoSummaryRow};

const MEMOS_FILE: &str = "memos.json";
const SUMMARIES_FILE: &str = "memo_summaries.json";

/// File-based memo store: one JSON array per table under the data directory.
///
/// Rows use the hosted table's column names, so the files double as an export.
pub struct FileMemoRepository {
    memos_path: PathBuf,
    summaries_path: PathBuf,
    // serializes read-modify-write cycles on both files
    lock: Mutex<()>,
}

impl FileMemoRepository {
    pub fn open(dir: &Path) -> Result<Self, PersistenceError> {
        ensure_dir(dir)?;
        Ok(Self {
            memos_path: dir.join(MEMOS_FILE),
            summaries_path: dir.join(SUMMARIES_FILE),
            lock: Mutex::new(()),
        })
    }

    async fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PersistenceError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(rows)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!("Wrote {} rows to {}", rows.len(), path.display());
        Ok(())
    }

    async fn read_memos(&self) -> Result<Vec<Memo>, PersistenceError> {
        let rows: Vec<MemoRow> = Self::read_rows(&self.memos_path).await?;
        Ok(rows.into_iter().map(Memo::from).collect())
    }

    async fn write_memos(&self, memos: &[Memo]) -> Result<(), PersistenceError> {
        let rows: Vec<MemoRow> = memos.iter().map(MemoRow::from).collect();
        Self::write_rows(&self.memos_path, &rows).await
    }
}

#[async_trait]
impl MemoRepository for FileMemoRepository {
    async fn list(&self) -> Result<Vec<Memo>, PersistenceError> {
        let _guard = self.lock.lock().await;
        let mut memos = self.read_memos().await?;
        sort_newest_first(&mut memos);
        Ok(memos)
    }

    async fn insert(&self, memo: &Memo) -> Result<Memo, PersistenceError> {
        let _guard = self.lock.lock().await;
        let mut memos = self.read_memos().await?;
        if memos.iter().any(|m| m.id == memo.id) {
            return Err(PersistenceError::Other(format!(
                "duplicate key value: {}",
                memo.id
            )));
        }
        memos.push(memo.clone());
        self.write_memos(&memos).await?;
        Ok(memo.clone())
    }

    async fn update(
        &self,
        id: &str,
        form: &MemoForm,
        updated_at: DateTime<Utc>,
    ) -> Result<Memo, PersistenceError> {
        let _guard = self.lock.lock().await;
        let mut memos = self.read_memos().await?;
        let memo = memos
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        apply_patch(memo, form, updated_at);
        let updated = memo.clone();
        self.write_memos(&memos).await?;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock().await;
        let mut memos = self.read_memos().await?;
        let before = memos.len();
        memos.retain(|m| m.id != id);
        if memos.len() != before {
            self.write_memos(&memos).await?;
        }
        Ok(())
    }

    async fn insert_summary(&self, summary: &MemoSummary) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock().await;
        let mut rows: Vec<MemoSummaryRow> = Self::read_rows(&self.summaries_path).await?;
        rows.push(MemoSummaryRow::from(summary));
        Self::write_rows(&self.summaries_path, &rows).await
    }

    async fn latest_summary(&self, memo_id: &str) -> Result<Option<MemoSummary>, PersistenceError> {
        let _guard = self.lock.lock().await;
        let rows: Vec<MemoSummaryRow> = Self::read_rows(&self.summaries_path).await?;
        Ok(rows
            .into_iter()
            .filter(|r| r.memo_id == memo_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at))
            .map(MemoSummary::from))
    }
}
