//! The session collection and its CRUD operations.
//!
//! [`MemoStore`] owns the in-memory list of memos. Every mutation goes to the
//! repository first and is applied locally only once the repository has
//! confirmed it, so a failed call leaves the collection untouched.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{error, info, warn};

use crate::error::{MemoError, PersistenceError, Result};
use crate::persistence::MemoRepository;
use crate::query::{self, MemoQuery, QueryView};
use crate::types::{CategoryFilter, Memo, MemoForm};
use crate::util::timestamp_after;

/// Single-writer memo cache backed by a [`MemoRepository`].
pub struct MemoStore {
    repository: Arc<dyn MemoRepository>,
    memos: Vec<Memo>,
    query: MemoQuery,
    error: Option<String>,
}

impl MemoStore {
    /// Create an empty store. Call [`MemoStore::load_all`] to populate it.
    pub fn new(repository: Arc<dyn MemoRepository>) -> Self {
        Self {
            repository,
            memos: Vec::new(),
            query: MemoQuery::default(),
            error: None,
        }
    }

    /// Create a store and load the collection. A failed load leaves the store
    /// empty with its error set.
    pub async fn open(repository: Arc<dyn MemoRepository>) -> Self {
        let mut store = Self::new(repository);
        if let Err(e) = store.load_all().await {
            warn!("Initial memo load failed: {}", e);
        }
        store
    }

    pub fn repository(&self) -> &Arc<dyn MemoRepository> {
        &self.repository
    }

    /// The whole collection, newest first.
    pub fn memos(&self) -> &[Memo] {
        &self.memos
    }

    pub fn len(&self) -> usize {
        self.memos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memos.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Memo> {
        self.memos.iter().find(|m| m.id == id)
    }

    /// Message of the last failed operation.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn query(&self) -> &MemoQuery {
        &self.query
    }

    /// Set the search text for the view.
    pub fn search(&mut self, text: impl Into<String>) {
        self.query.search = text.into();
    }

    /// Set the category filter for the view.
    pub fn filter_by_category(&mut self, filter: CategoryFilter) {
        self.query.category = filter;
    }

    /// Current filtered view and stats.
    pub fn view(&self) -> QueryView<'_> {
        query::derive(&self.memos, &self.query)
    }

    /// View for an ad-hoc query, leaving the stored query untouched.
    pub fn view_with<'a>(&'a self, query: &MemoQuery) -> QueryView<'a> {
        query::derive(&self.memos, query)
    }

    fn record_failure(&mut self, action: &str, err: MemoError) -> MemoError {
        error!("Failed to {}: {}", action, err);
        self.error = Some(err.to_string());
        err
    }

    /// Replace the collection with the repository's contents, newest first.
    pub async fn load_all(&mut self) -> Result<()> {
        self.error = None;
        match self.repository.list().await {
            Ok(mut memos) => {
                memos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                info!("Loaded {} memos", memos.len());
                self.memos = memos;
                Ok(())
            }
            Err(e) => Err(self.record_failure("load memos", e.into())),
        }
    }

    /// Persist a new memo and prepend it to the collection.
    pub async fn create(&mut self, form: MemoForm) -> Result<Memo> {
        form.validate()?;
        let memo = Memo::from_form(form.normalized(), Utc::now());

        match self.repository.insert(&memo).await {
            Ok(stored) => {
                info!("Created memo {}", stored.id);
                self.memos.insert(0, stored.clone());
                Ok(stored)
            }
            Err(e) => Err(self.record_failure("create memo", e.into())),
        }
    }

    /// Persist new field values for `id` and swap in the stored record.
    pub async fn update(&mut self, id: &str, form: MemoForm) -> Result<Memo> {
        form.validate()?;
        let form = form.normalized();
        let updated_at = match self.get(id) {
            Some(existing) => timestamp_after(existing.updated_at),
            None => Utc::now(),
        };

        match self.repository.update(id, &form, updated_at).await {
            Ok(stored) => {
                info!("Updated memo {}", id);
                if let Some(slot) = self.memos.iter_mut().find(|m| m.id == id) {
                    *slot = stored.clone();
                }
                Ok(stored)
            }
            Err(PersistenceError::NotFound(_)) => {
                Err(self.record_failure("update memo", MemoError::NotFound(id.to_string())))
            }
            Err(e) => Err(self.record_failure("update memo", e.into())),
        }
    }

    /// Delete `id` remotely, then drop it from the collection.
    pub async fn delete(&mut self, id: &str) -> Result<()> {
        match self.repository.delete(id).await {
            Ok(()) => {
                info!("Deleted memo {}", id);
                self.memos.retain(|m| m.id != id);
                Ok(())
            }
            Err(e) => Err(self.record_failure("delete memo", e.into())),
        }
    }

    /// Delete every memo, issuing all deletes at once.
    ///
    /// Memos whose delete succeeded are removed even when others fail; the
    /// first failure is returned. The query is reset only on full success.
    pub async fn clear_all(&mut self) -> Result<()> {
        let ids: Vec<String> = self.memos.iter().map(|m| m.id.clone()).collect();
        let repository = Arc::clone(&self.repository);
        let outcomes = join_all(ids.iter().map(|id| repository.delete(id))).await;

        let mut first_error = None;
        let mut removed = 0usize;
        for (id, outcome) in ids.iter().zip(outcomes) {
            match outcome {
                Ok(()) => {
                    self.memos.retain(|m| &m.id != id);
                    removed += 1;
                }
                Err(e) => {
                    warn!("Failed to delete memo {} while clearing: {}", id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => {
                info!("Cleared {} memos", removed);
                self.query = MemoQuery::default();
                Ok(())
            }
            Some(e) => Err(self.record_failure("clear memos", e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::persistence::memory::InMemoryRepository;
    use crate::persistence::testing::FlakyRepository;
    use crate::types::Category;

    fn ids(store: &MemoStore) -> Vec<String> {
        store.memos().iter().map(|m| m.id.clone()).collect()
    }

    async fn flaky_store() -> (Arc<FlakyRepository>, MemoStore) {
        let repo = Arc::new(FlakyRepository::new());
        let store = MemoStore::new(repo.clone());
        (repo, store)
    }

    #[tokio::test]
    async fn test_create_then_update_scenario() {
        let mut store = MemoStore::new(Arc::new(InMemoryRepository::new()));

        let created = store
            .create(MemoForm::new("T", "C").with_category(Category::Work))
            .await
            .unwrap();
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(created.category, Category::Work);
        assert!(created.tags.is_empty());

        let updated = store
            .update(
                &created.id,
                MemoForm::new("T", "C")
                    .with_category(Category::Work)
                    .with_tags(["x"]),
            )
            .await
            .unwrap();
        assert!(updated.updated_at > updated.created_at);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.tags, vec!["x"]);
        assert_eq!(store.get(&created.id), Some(&updated));
    }

    #[tokio::test]
    async fn test_create_prepends() {
        let mut store = MemoStore::new(Arc::new(InMemoryRepository::new()));
        let a = store.create(MemoForm::new("a", "1")).await.unwrap();
        let b = store.create(MemoForm::new("b", "2")).await.unwrap();
        assert_eq!(ids(&store), vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_create_normalizes_tags() {
        let mut store = MemoStore::new(Arc::new(InMemoryRepository::new()));
        let memo = store
            .create(MemoForm::new("a", "1").with_tags(["x ", "x", " ", "y"]))
            .await
            .unwrap();
        assert_eq!(memo.tags, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_create_validation_skips_repository() {
        let (repo, mut store) = flaky_store().await;
        let err = store.create(MemoForm::new("", "body")).await.unwrap_err();
        assert!(err.is_validation());
        assert!(repo.inner.list().await.unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_create_failure_leaves_collection() {
        let (repo, mut store) = flaky_store().await;
        store.create(MemoForm::new("kept", "1")).await.unwrap();
        repo.fail_insert.store(true, Ordering::SeqCst);

        let err = store.create(MemoForm::new("lost", "2")).await.unwrap_err();
        assert!(matches!(err, MemoError::Persistence(_)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.memos()[0].title, "kept");
        assert!(store.error().is_some());
    }

    #[tokio::test]
    async fn test_update_not_found() {
        let mut store = MemoStore::new(Arc::new(InMemoryRepository::new()));
        let err = store
            .update("missing", MemoForm::new("T", "C"))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoError::NotFound(ref id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_update_failure_leaves_record() {
        let (repo, mut store) = flaky_store().await;
        let memo = store.create(MemoForm::new("T", "C")).await.unwrap();
        repo.fail_update.store(true, Ordering::SeqCst);

        assert!(store.update(&memo.id, MemoForm::new("T2", "C2")).await.is_err());
        assert_eq!(store.get(&memo.id), Some(&memo));
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_record() {
        let (repo, mut store) = flaky_store().await;
        let memo = store.create(MemoForm::new("T", "C")).await.unwrap();
        repo.fail_delete_of(&memo.id);

        assert!(store.delete(&memo.id).await.is_err());
        assert_eq!(ids(&store), vec![memo.id.clone()]);
    }

    #[tokio::test]
    async fn test_delete() {
        let mut store = MemoStore::new(Arc::new(InMemoryRepository::new()));
        let a = store.create(MemoForm::new("a", "1")).await.unwrap();
        let b = store.create(MemoForm::new("b", "2")).await.unwrap();
        store.delete(&a.id).await.unwrap();
        assert_eq!(ids(&store), vec![b.id]);
    }

    #[tokio::test]
    async fn test_create_then_load_all_roundtrip() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut store = MemoStore::new(repo.clone());
        let created = store
            .create(MemoForm::new("T", "C").with_tags(["a", "b"]))
            .await
            .unwrap();

        let mut fresh = MemoStore::new(repo);
        fresh.load_all().await.unwrap();
        assert_eq!(fresh.memos(), &[created]);
    }

    #[tokio::test]
    async fn test_load_failure_keeps_previous_collection() {
        let (repo, mut store) = flaky_store().await;
        store.create(MemoForm::new("a", "1")).await.unwrap();
        store.load_all().await.unwrap();
        assert_eq!(store.len(), 1);

        repo.fail_list.store(true, Ordering::SeqCst);
        assert!(store.load_all().await.is_err());
        assert_eq!(store.len(), 1);
        assert!(store.error().unwrap().contains("list unavailable"));

        store.clear_error();
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn test_clear_all_success_resets_query() {
        let mut store = MemoStore::new(Arc::new(InMemoryRepository::new()));
        for i in 0..4 {
            store.create(MemoForm::new(format!("m{i}"), "x")).await.unwrap();
        }
        store.search("m1");
        store.filter_by_category(CategoryFilter::Only(Category::Work));

        store.clear_all().await.unwrap();
        assert!(store.is_empty());
        assert_eq!(store.query(), &MemoQuery::default());
        assert!(store.repository().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_partial_failure() {
        let (repo, mut store) = flaky_store().await;
        let a = store.create(MemoForm::new("a", "1")).await.unwrap();
        let b = store.create(MemoForm::new("b", "2")).await.unwrap();
        let c = store.create(MemoForm::new("c", "3")).await.unwrap();
        repo.fail_delete_of(&b.id);
        store.search("keep me");

        let err = store.clear_all().await.unwrap_err();
        assert!(matches!(err, MemoError::Persistence(_)));
        assert_eq!(ids(&store), vec![b.id.clone()]);
        assert_eq!(store.query().search, "keep me");

        let remote: Vec<String> = repo.inner.list().await.unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(remote, vec![b.id]);
        assert!(store.get(&a.id).is_none());
        assert!(store.get(&c.id).is_none());
    }

    #[tokio::test]
    async fn test_membership_tracks_successful_operations() {
        let (repo, mut store) = flaky_store().await;
        let a = store.create(MemoForm::new("a", "1")).await.unwrap();
        let b = store.create(MemoForm::new("b", "2")).await.unwrap();

        repo.fail_insert.store(true, Ordering::SeqCst);
        let _ = store.create(MemoForm::new("c", "3")).await;
        repo.fail_insert.store(false, Ordering::SeqCst);

        repo.fail_delete_of(&a.id);
        let _ = store.delete(&a.id).await;
        store.delete(&b.id).await.unwrap();

        let d = store.create(MemoForm::new("d", "4")).await.unwrap();

        assert_eq!(ids(&store), vec![d.id.clone(), a.id.clone()]);
        let mut remote: Vec<String> =
            repo.inner.list().await.unwrap().into_iter().map(|m| m.id).collect();
        remote.sort();
        let mut local = ids(&store);
        local.sort();
        assert_eq!(local, remote);
    }

    #[tokio::test]
    async fn test_view_uses_store_query() {
        let mut store = MemoStore::new(Arc::new(InMemoryRepository::new()));
        store
            .create(MemoForm::new("Rust", "ownership").with_category(Category::Study))
            .await
            .unwrap();
        store
            .create(MemoForm::new("Plan", "roadmap").with_category(Category::Work))
            .await
            .unwrap();

        store.filter_by_category(CategoryFilter::Only(Category::Study));
        let view = store.view();
        assert_eq!(view.stats.total, 2);
        assert_eq!(view.stats.filtered, 1);
        assert_eq!(view.memos[0].title, "Rust");

        let adhoc = store.view_with(&MemoQuery::new("road", CategoryFilter::All));
        assert_eq!(adhoc.memos[0].title, "Plan");
        assert_eq!(store.query().category, CategoryFilter::Only(Category::Study));
    }

    #[tokio::test]
    async fn test_open_with_failing_repository() {
        let repo = Arc::new(FlakyRepository::new());
        repo.fail_list.store(true, Ordering::SeqCst);
        let store = MemoStore::open(repo).await;
        assert!(store.is_empty());
        assert!(store.error().is_some());
    }
}
