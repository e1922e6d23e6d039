//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/news` | Filtered, paginated posts (`tag`, `source`, `search`, `page`, `limit`) |
//! | `GET`  | `/api/news/{id}` | One post with tags and source |
//! | `GET`  | `/api/filters` | All tags and sources |
//! | `POST` | `/api/update` | Trigger an ingestion run |
//! | `GET`  | `/api/update` | Recent run ledger rows (`limit`, default 10) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "unknown update type: 'x'" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//! Malformed bodies, query strings and path ids answer `bad_request`.
//!
//! A triggered run that fails is not an HTTP error: `POST /api/update`
//! answers 200 with `success: false` and the run's message.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use newsdesk_core::models::{IngestionRun, PostView, Source, Tag};
use newsdesk_core::pipeline::UpdateOutcome;
use newsdesk_core::social::{SearchMode, SocialClient};
use newsdesk_core::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::social::HttpSocialClient;
use crate::sqlite_store::SqliteStore;
use crate::update::{accounts_request, search_request, trigger};

const DEFAULT_RUN_LIMIT: u32 = 10;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<dyn Store>,
    /// `None` when no API key is configured; reads still work.
    client: Option<Arc<dyn SocialClient>>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        client: Option<Arc<dyn SocialClient>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            client,
        }
    }
}

/// Builds the router with CORS applied.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/news", get(handle_list_news))
        .route("/api/news/{id}", get(handle_get_news))
        .route("/api/filters", get(handle_filters))
        .route("/api/update", get(handle_list_runs).post(handle_update))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let store = SqliteStore::connect(config).await?;

    let client: Option<Arc<dyn SocialClient>> = match HttpSocialClient::from_config(&config.social)
    {
        Ok(c) => Some(Arc::new(c) as Arc<dyn SocialClient>),
        Err(e) => {
            tracing::warn!(error = %e, "Social client unavailable; POST /api/update is disabled");
            None
        }
    };

    let app = build_router(AppState::new(config.clone(), Arc::new(store), client));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, "newsdesk API listening");
    println!("newsdesk API listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{:#}", err), "Request failed");
        internal(format!("{:#}", err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /api/news ============

#[derive(Debug, Deserialize)]
struct NewsQuery {
    tag: Option<String>,
    source: Option<String>,
    search: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Serialize)]
struct NewsListResponse {
    success: bool,
    news: Vec<PostView>,
}

async fn handle_list_news(
    State(state): State<AppState>,
    query: Result<Query<NewsQuery>, QueryRejection>,
) -> Result<Json<NewsListResponse>, AppError> {
    let Query(query) = query?;
    let filter = crate::news::NewsArgs {
        tag: query.tag,
        source: query.source,
        search: query.search,
        page: query.page.unwrap_or(1),
        limit: query.limit,
    }
    .into_filter(&state.config);

    let news = state.store.list_posts(&filter).await?;
    Ok(Json(NewsListResponse {
        success: true,
        news,
    }))
}

// ============ GET /api/news/{id} ============

#[derive(Serialize)]
struct NewsItemResponse {
    success: bool,
    news: PostView,
}

async fn handle_get_news(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<NewsItemResponse>, AppError> {
    let Path(id) = id?;
    let news = state
        .store
        .get_post(id)
        .await?
        .ok_or_else(|| not_found(format!("post not found: {}", id)))?;
    Ok(Json(NewsItemResponse {
        success: true,
        news,
    }))
}

// ============ GET /api/filters ============

#[derive(Serialize)]
struct FiltersData {
    tags: Vec<Tag>,
    sources: Vec<Source>,
}

#[derive(Serialize)]
struct FiltersResponse {
    success: bool,
    data: FiltersData,
}

async fn handle_filters(State(state): State<AppState>) -> Result<Json<FiltersResponse>, AppError> {
    let tags = state.store.list_tags().await?;
    let sources = state.store.list_sources().await?;
    Ok(Json(FiltersResponse {
        success: true,
        data: FiltersData { tags, sources },
    }))
}

// ============ POST /api/update ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    #[serde(rename = "type")]
    kind: String,
    query: Option<String>,
    count: Option<u32>,
    mode: Option<String>,
    accounts: Option<Vec<String>>,
    #[serde(alias = "tweetsPerAccount")]
    count_per_account: Option<u32>,
}

async fn handle_update(
    State(state): State<AppState>,
    body: Result<Json<UpdateBody>, JsonRejection>,
) -> Result<Json<UpdateOutcome>, AppError> {
    let Json(body) = body?;
    let request = match body.kind.as_str() {
        "query-search" | "twitter_search" => {
            let mode = match body.mode.as_deref() {
                Some(m) => m
                    .parse::<SearchMode>()
                    .map_err(|e| bad_request(e.to_string()))?,
                None => SearchMode::default(),
            };
            search_request(&state.config, body.query, body.count, mode)
        }
        "account-batch" | "twitter_accounts" => accounts_request(
            &state.config,
            body.accounts.unwrap_or_default(),
            body.count_per_account,
        ),
        other => return Err(bad_request(format!("unknown update type: '{}'", other))),
    };

    let client = state.client.as_ref().ok_or_else(|| {
        internal(format!(
            "social client not configured: set {}",
            state.config.social.api_key_env
        ))
    })?;

    let outcome = trigger(&state.config, state.store.as_ref(), client.as_ref(), &request).await;
    Ok(Json(outcome))
}

// ============ GET /api/update ============

#[derive(Debug, Deserialize)]
struct RunsQuery {
    limit: Option<u32>,
}

#[derive(Serialize)]
struct RunsResponse {
    success: bool,
    logs: Vec<IngestionRun>,
}

async fn handle_list_runs(
    State(state): State<AppState>,
    query: Result<Query<RunsQuery>, QueryRejection>,
) -> Result<Json<RunsResponse>, AppError> {
    let Query(query) = query?;
    let limit = match query.limit {
        Some(0) | None => DEFAULT_RUN_LIMIT,
        Some(n) => n.min(state.config.query.max_limit),
    };
    let logs = state.store.list_runs(limit).await?;
    Ok(Json(RunsResponse {
        success: true,
        logs,
    }))
}
