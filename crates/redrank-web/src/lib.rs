//! Axum trigger surface for redrank: on-demand and batch sync endpoints
//! plus read access to stored rankings.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use redrank_core::SyncError;
use redrank_storage::RankStore;
use redrank_sync::SyncEngine;
use tokio::net::TcpListener;
use tracing::warn;
use uuid::Uuid;

pub const CRATE_NAME: &str = "redrank-web";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
    pub store: Arc<dyn RankStore>,
    /// Shared secret gating the batch endpoint. `None` leaves it open.
    pub sync_token: Option<String>,
}

impl AppState {
    pub fn new(engine: Arc<SyncEngine>, sync_token: Option<String>) -> Self {
        let store = engine.store();
        Self {
            engine,
            store,
            sync_token,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/sync/keywords/{id}", post(sync_keyword_handler))
        .route("/sync/run", post(sync_run_handler))
        .route("/keywords", get(keywords_handler))
        .route("/keywords/{id}/posts", get(keyword_posts_handler))
        .route("/posts/{id}/history", get(post_history_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("REDRANK_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let config = redrank_sync::SyncConfig::from_env();
    let engine = redrank_sync::build_engine_from_env(&config).await?;
    let sync_token = std::env::var("REDRANK_SYNC_TOKEN").ok();

    if let Some(sched) = redrank_sync::maybe_build_scheduler(engine.clone(), &config).await? {
        sched.start().await?;
    }

    let state = AppState::new(engine, sync_token);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn sync_keyword_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.engine.sync_keyword_by_id(id).await {
        Ok(posts) => Json(posts).into_response(),
        Err(err) => sync_error_response(err),
    }
}

async fn sync_run_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(expected) = &state.sync_token {
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(expected.as_str()) {
            warn!("batch sync rejected: bearer token mismatch");
            return error_response(StatusCode::UNAUTHORIZED, "invalid sync token");
        }
    }

    match state.engine.sync_all().await {
        Ok(summary) => Json(summary).into_response(),
        Err(err) => sync_error_response(err),
    }
}

async fn keywords_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.store.keywords().await {
        Ok(keywords) => Json(keywords).into_response(),
        Err(err) => sync_error_response(err),
    }
}

async fn keyword_posts_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.store.posts_for_keyword(id).await {
        Ok(posts) => Json(posts).into_response(),
        Err(err) => sync_error_response(err),
    }
}

async fn post_history_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.store.history_for_post(id).await {
        Ok(history) => Json(history).into_response(),
        Err(err) => sync_error_response(err),
    }
}

fn sync_error_response(err: SyncError) -> Response {
    let status = match &err {
        SyncError::KeywordNotFound { .. } => StatusCode::NOT_FOUND,
        SyncError::Provider { .. } => StatusCode::BAD_GATEWAY,
        SyncError::Configuration { .. } | SyncError::Persistence(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, &err.to_string())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
