use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod search;

use engine::SearchEngine;
use error::EngineError;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize, Deserialize, Debug)]
pub struct Message {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ApiError {
    pub error: String,
}

#[derive(Serialize, Debug)]
pub struct AutocompleteResponse {
    pub suggestions: Vec<search::Suggestion>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Free-text query; empty matches every film
    pub search_string: Option<String>,
    /// Zero-based page index
    pub start: Option<i64>,
    /// Page size
    pub rows: Option<i64>,
    pub duration_minimum: Option<i32>,
    pub duration_maximum: Option<i32>,
    pub vote_average_minimum: Option<f64>,
    #[serde(default, deserialize_with = "optional_date")]
    pub release_date_start: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_date")]
    pub release_date_end: Option<NaiveDate>,
}

/// Accepts every layout the catalog does, including `yyyy-MM-ddTHH:mm:ss`.
/// A blank value means no bound.
fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => search::parse::parse_date(text).map(Some).ok_or_else(|| {
            <D::Error as serde::de::Error>::custom(format!("invalid date: {}", text))
        }),
    }
}

impl SearchParams {
    pub fn into_request(self) -> search::SearchRequest {
        search::SearchRequest {
            text: self.search_string.unwrap_or_default(),
            start: self.start.unwrap_or(0),
            rows: self.rows.unwrap_or(10),
            filters: search::SearchFilters {
                runtime_min: self.duration_minimum,
                runtime_max: self.duration_maximum,
                vote_average_min: self.vote_average_minimum,
                release_date_start: self.release_date_start,
                release_date_end: self.release_date_end,
            },
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AutocompleteParams {
    pub search_string: Option<String>,
}

// ============================================================================
// App State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
}

// ============================================================================
// Router Setup
// ============================================================================

pub fn create_app(engine: Arc<SearchEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState { engine };

    Router::new()
        // Health
        .route("/", get(root))
        .route("/api/health", get(health_check))
        // Reads
        .route("/api/search", get(search_films))
        .route("/api/autocomplete", get(autocomplete))
        // Index administration
        .route("/api/index", post(populate_index).delete(delete_index))
        .route("/api/index/reload", post(reload_index))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run a blocking engine call off the async runtime.
async fn run_blocking<T, F>(state: &AppState, call: F) -> Result<T, (StatusCode, Json<ApiError>)>
where
    T: Send + 'static,
    F: FnOnce(&SearchEngine) -> anyhow::Result<T> + Send + 'static,
{
    let engine = state.engine.clone();
    tokio::task::spawn_blocking(move || call(engine.as_ref()))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(engine_error)
}

fn engine_error(e: anyhow::Error) -> (StatusCode, Json<ApiError>) {
    let status = match e.downcast_ref::<EngineError>() {
        Some(EngineError::InvalidPage { .. }) => StatusCode::BAD_REQUEST,
        Some(EngineError::RebuildTimeout(_)) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!("Request failed: {:#}", e);
    api_error(status, format!("{:#}", e))
}

fn api_error(status: StatusCode, error: String) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError { error }))
}

// ============================================================================
// Handlers: Health
// ============================================================================

async fn root() -> &'static str {
    "Film Search API - v0.1.0"
}

async fn health_check() -> Json<Message> {
    Json(Message {
        message: "Film search is running!".to_string(),
    })
}

// ============================================================================
// Handlers: Search & Autocomplete
// ============================================================================

async fn search_films(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<search::SearchPage> {
    let request = params.into_request();
    run_blocking(&state, move |engine| engine.search(&request))
        .await
        .map(Json)
}

async fn autocomplete(
    State(state): State<AppState>,
    Query(params): Query<AutocompleteParams>,
) -> ApiResult<AutocompleteResponse> {
    let suggestions = run_blocking(&state, move |engine| {
        engine.autocomplete(params.search_string.as_deref())
    })
    .await?;

    Ok(Json(AutocompleteResponse { suggestions }))
}

// ============================================================================
// Handlers: Index Administration
// ============================================================================

async fn populate_index(State(state): State<AppState>) -> ApiResult<Message> {
    let added = run_blocking(&state, |engine| engine.populate_index()).await?;
    Ok(Json(Message {
        message: format!("Indexed {} films", added),
    }))
}

async fn delete_index(State(state): State<AppState>) -> ApiResult<Message> {
    run_blocking(&state, |engine| engine.delete_index()).await?;
    Ok(Json(Message {
        message: "Index deleted".to_string(),
    }))
}

async fn reload_index(State(state): State<AppState>) -> ApiResult<Message> {
    let added = run_blocking(&state, |engine| engine.reload_index()).await?;
    Ok(Json(Message {
        message: format!("Reloaded index with {} films", added),
    }))
}
