use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response};
use tracing::debug;

use crate::error::PersistenceError;
use crate::types::{Memo, MemoForm, MemoSummary};
use crate::util::http;

use super::{MemoPatchRow, MemoRepository, MemoRow, MemoSummaryRow};

/// Hosted memo tables behind a PostgREST endpoint (e.g. Supabase).
pub struct RestMemoRepository {
    rest_base: String,
    api_key: String,
    memos_table: String,
    summaries_table: String,
}

impl RestMemoRepository {
    pub fn new(url: &str, api_key: &str, memos_table: &str, summaries_table: &str) -> Self {
        let url = url.trim_end_matches('/');
        let rest_base = if url.ends_with("/rest/v1") {
            url.to_string()
        } else {
            format!("{}/rest/v1", url)
        };
        Self {
            rest_base,
            api_key: api_key.to_string(),
            memos_table: memos_table.to_string(),
            summaries_table: summaries_table.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_base, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        http::client()
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(builder: RequestBuilder) -> Result<Response, PersistenceError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl MemoRepository for RestMemoRepository {
    async fn list(&self) -> Result<Vec<Memo>, PersistenceError> {
        debug!("Listing memos from {}", self.memos_table);
        let rows: Vec<MemoRow> = Self::send(
            self.request(Method::GET, &self.memos_table)
                .query(&[("select", "*"), ("order", "created_at.desc")]),
        )
        .await?
        .json()
        .await?;
        Ok(rows.into_iter().map(Memo::from).collect())
    }

    async fn insert(&self, memo: &Memo) -> Result<Memo, PersistenceError> {
        debug!("Inserting memo {}", memo.id);
        let rows: Vec<MemoRow> = Self::send(
            self.request(Method::POST, &self.memos_table)
                .header("Prefer", "return=representation")
                .json(&MemoRow::from(memo)),
        )
        .await?
        .json()
        .await?;
        rows.into_iter()
            .next()
            .map(Memo::from)
            .ok_or_else(|| PersistenceError::Other("insert returned no row".to_string()))
    }

    async fn update(
        &self,
        id: &str,
        form: &MemoForm,
        updated_at: DateTime<Utc>,
    ) -> Result<Memo, PersistenceError> {
        debug!("Updating memo {}", id);
        let rows: Vec<MemoRow> = Self::send(
            self.request(Method::PATCH, &self.memos_table)
                .query(&[("id", format!("eq.{}", id))])
                .header("Prefer", "return=representation")
                .json(&MemoPatchRow::new(form, updated_at)),
        )
        .await?
        .json()
        .await?;
        rows.into_iter()
            .next()
            .map(Memo::from)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        debug!("Deleting memo {}", id);
        Self::send(
            self.request(Method::DELETE, &self.memos_table)
                .query(&[("id", format!("eq.{}", id))]),
        )
        .await?;
        Ok(())
    }

    async fn insert_summary(&self, summary: &MemoSummary) -> Result<(), PersistenceError> {
        Self::send(
            self.request(Method::POST, &self.summaries_table)
                .header("Prefer", "return=minimal")
                .json(&MemoSummaryRow::from(summary)),
        )
        .await?;
        Ok(())
    }

    async fn latest_summary(&self, memo_id: &str) -> Result<Option<MemoSummary>, PersistenceError> {
        let rows: Vec<MemoSummaryRow> = Self::send(
            self.request(Method::GET, &self.summaries_table).query(&[
                ("select", "*".to_string()),
                ("memo_id", format!("eq.{}", memo_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", "1".to_string()),
            ]),
        )
        .await?
        .json()
        .await?;
        Ok(rows.into_iter().next().map(MemoSummary::from))
    }
}
