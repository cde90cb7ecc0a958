use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{self, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::error::MemoError;
use crate::persistence::MemoRepository;
use crate::provider::{self, LlmProvider};
use crate::query::{MemoQuery, QueryStats, QueryView};
use crate::service::summary::SummaryService;
use crate::service::tags::TagSuggester;
use crate::store::MemoStore;
use crate::types::{CategoryFilter, Memo, MemoForm};

/// Shared application state for the HTTP API.
pub struct AppState {
    pub config: Config,
    pub store: Mutex<MemoStore>,
    pub tags: TagSuggester,
    pub summaries: SummaryService,
}

impl AppState {
    /// Build the state around `repository` and load the memo collection.
    pub async fn new(
        config: Config,
        repository: Arc<dyn MemoRepository>,
        provider: Option<Arc<dyn LlmProvider>>,
    ) -> Self {
        let tags = TagSuggester::new(provider.clone(), &config.ai);
        let summaries = SummaryService::new(provider, Arc::clone(&repository), &config.ai);
        let store = MemoStore::open(repository).await;
        Self {
            config,
            store: Mutex::new(store),
            tags,
            summaries,
        }
    }

    /// Create AppState with an LLM provider auto-configured from config.
    pub async fn with_provider(config: Config, repository: Arc<dyn MemoRepository>) -> Self {
        let model = config.ai.model.clone();
        let provider = config.get_api_key(Some(&model)).map(|key| {
            let api_base = config.get_api_base(Some(&model));
            Arc::from(provider::create_provider(key, api_base, &model)) as Arc<dyn LlmProvider>
        });
        if provider.is_none() {
            tracing::warn!(
                "No API key configured for model {}; summaries and tag suggestions are disabled",
                model
            );
        }
        Self::new(config, repository, provider).await
    }
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A failed request: status plus message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<MemoError> for ApiError {
    fn from(err: MemoError) -> Self {
        let status = match &err {
            MemoError::Validation(_) => StatusCode::BAD_REQUEST,
            MemoError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed: {}", self.message);
        }
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Request body for `POST /api/summarize`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    pub content: Option<String>,
    pub title: Option<String>,
    pub memo_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub summary: String,
}

/// Request body for `POST /api/tags/suggest`.
#[derive(Debug, Deserialize)]
pub struct SuggestTagsRequest {
    pub content: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuggestTagsResponse {
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct LatestSummaryResponse {
    pub summary: Option<String>,
}

/// Query string for `GET /api/memos`.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub category: Option<String>,
}

impl ListParams {
    fn to_query(&self) -> MemoQuery {
        MemoQuery::new(
            self.q.clone().unwrap_or_default(),
            CategoryFilter::parse(self.category.as_deref().unwrap_or_default()),
        )
    }
}

/// Filtered memos with collection stats.
#[derive(Debug, Serialize)]
pub struct MemoListResponse {
    pub memos: Vec<Memo>,
    pub stats: QueryStats,
}

impl From<QueryView<'_>> for MemoListResponse {
    fn from(view: QueryView<'_>) -> Self {
        Self {
            memos: view.to_memos(),
            stats: view.stats,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Create the axum Router with all API routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // AI adapters
        .route("/api/summarize", post(handle_summarize))
        .route("/api/tags/suggest", post(handle_suggest_tags))
        // Memos
        .route(
            "/api/memos",
            get(handle_list_memos)
                .post(handle_create_memo)
                .delete(handle_clear_memos),
        )
        .route("/api/memos/reload", post(handle_reload_memos))
        .route(
            "/api/memos/{id}",
            get(handle_get_memo)
                .put(handle_update_memo)
                .delete(handle_delete_memo),
        )
        .route("/api/memos/{id}/summary", get(handle_latest_summary))
        // Health
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::PUT,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                ])
                .allow_headers([http::header::CONTENT_TYPE]),
        )
        .with_state(state)
}

fn required(value: Option<String>, field: &str) -> ApiResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| MemoError::validation(format!("{} is required", field)).into())
}

/// POST /api/summarize
async fn handle_summarize(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SummarizeRequest>, JsonRejection>,
) -> ApiResult<Json<SummarizeResponse>> {
    let Json(req) = body?;
    let content = required(req.content, "content")?;
    let memo_id = required(req.memo_id, "memoId")?;

    let summary = state
        .summaries
        .summarize(&memo_id, req.title.as_deref(), &content)
        .await?;
    Ok(Json(SummarizeResponse { summary }))
}

/// POST /api/tags/suggest
async fn handle_suggest_tags(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SuggestTagsRequest>, JsonRejection>,
) -> ApiResult<Json<SuggestTagsResponse>> {
    let Json(req) = body?;
    let content = required(req.content, "content")?;

    let tags = state.tags.suggest(req.title.as_deref(), &content).await?;
    Ok(Json(SuggestTagsResponse { tags }))
}

/// GET /api/memos?q=&category=
async fn handle_list_memos(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Json<MemoListResponse> {
    let store = state.store.lock().await;
    let response = MemoListResponse::from(store.view_with(&params.to_query()));
    Json(response)
}

/// POST /api/memos
async fn handle_create_memo(
    State(state): State<Arc<AppState>>,
    body: Result<Json<MemoForm>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Memo>)> {
    let Json(form) = body?;
    let memo = state.store.lock().await.create(form).await?;
    Ok((StatusCode::CREATED, Json(memo)))
}

/// DELETE /api/memos
async fn handle_clear_memos(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    state.store.lock().await.clear_all().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/memos/reload
async fn handle_reload_memos(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<MemoListResponse>> {
    let mut store = state.store.lock().await;
    store.load_all().await?;
    let response = MemoListResponse::from(store.view());
    Ok(Json(response))
}

/// GET /api/memos/{id}
async fn handle_get_memo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Memo>> {
    let store = state.store.lock().await;
    let memo = store.get(&id).cloned().ok_or(MemoError::NotFound(id))?;
    Ok(Json(memo))
}

/// PUT /api/memos/{id}
async fn handle_update_memo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<MemoForm>, JsonRejection>,
) -> ApiResult<Json<Memo>> {
    let Json(form) = body?;
    let memo = state.store.lock().await.update(&id, form).await?;
    Ok(Json(memo))
}

/// DELETE /api/memos/{id}
async fn handle_delete_memo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.lock().await.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/memos/{id}/summary
async fn handle_latest_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<LatestSummaryResponse> {
    Json(LatestSummaryResponse {
        summary: state.summaries.latest_summary(&id).await,
    })
}

/// GET /health
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
    })
}

/// Start the HTTP server on the given address.
pub async fn serve(addr: &str, state: Arc<AppState>) -> std::io::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, router).await
}
