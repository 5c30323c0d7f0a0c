//! # HTTP Server Implementation
//!
//! REST API over the store's key/value contract.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use seglog_core::config::ApiConfig;
use seglog_core::Error;
use seglog_store::{Store, StoreStats};

// ========== API Types ==========

#[derive(Debug, Serialize, Deserialize)]
pub struct RespBody {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReqBody {
    pub value: String,
}

// ========== Server State ==========

pub struct AppState {
    pub store: Arc<Store>,
}

impl AppState {
    pub async fn new(config: ApiConfig) -> seglog_core::Result<Self> {
        let store = Store::open(config.store).await?;
        Ok(Self {
            store: Arc::new(store),
        })
    }
}

// ========== Routes ==========

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route(
            "/db/:key",
            get(get_value).post(put_value).delete(delete_value),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StoreStats>, (StatusCode, String)> {
    state
        .store
        .stats()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn get_value(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<RespBody>, (StatusCode, String)> {
    match state.store.get(&key).await {
        Ok(value) => Ok(Json(RespBody { key, value })),
        Err(e) if e.is_not_found() => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

async fn put_value(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(body): Json<ReqBody>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.store.put(&key, &body.value).await {
        Ok(()) => Ok(StatusCode::CREATED),
        Err(e @ Error::ReservedValue(_)) => Err((StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

async fn delete_value(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.store.delete(&key).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
