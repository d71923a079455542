//! # routes::dashboard
//!
//! Read endpoints plus the explicit dotted-path write API.
//!
//! | Method | Path                    | Description                                |
//! |--------|-------------------------|--------------------------------------------|
//! | GET    | `/api/health`           | Liveness + revision                        |
//! | GET    | `/api/state`            | Snapshot, simulation flag, analytics stats |
//! | GET    | `/api/value?path=`      | Value at a dotted path                     |
//! | POST   | `/api/value`            | `{path, value}` write                      |
//! | DELETE | `/api/value?path=`      | Remove an object key                       |
//! | GET    | `/api/history/:symbol`  | Price history, oldest first                |
//! | GET    | `/api/mutations`        | Mutation log, count and rate               |

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{error::AppError, state::SharedState};

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    pub path: String,
    pub value: Value,
}

/// GET /api/health
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "ok":         true,
        "status":     "healthy",
        "revision":   state.store.revision(),
        "simulating": state.simulator.is_running(),
    }))
}

/// GET /api/state
pub async fn get_state(State(state): State<SharedState>) -> impl IntoResponse {
    let status = state.status().await;
    Json(json!({
        "ok":     true,
        "status": status,
    }))
}

/// GET /api/value?path=stocks.AAPL.price
pub async fn get_value(
    State(state): State<SharedState>,
    Query(query): Query<PathQuery>,
) -> Result<impl IntoResponse, AppError> {
    let value = state
        .store
        .get(&query.path)
        .await
        .ok_or_else(|| AppError::NotFound(format!("path '{}'", query.path)))?;

    Ok(Json(json!({
        "ok":    true,
        "path":  query.path,
        "value": value,
    })))
}

/// POST /api/value
pub async fn set_value(
    State(state): State<SharedState>,
    Json(request): Json<WriteRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.path.trim().is_empty() {
        return Err(AppError::BadRequest("path must not be empty".into()));
    }

    state.store.set(&request.path, request.value).await?;
    tracing::info!(path = %request.path, "✏️ Explicit write applied");

    Ok(Json(json!({
        "ok":       true,
        "path":     request.path,
        "revision": state.store.revision(),
    })))
}

/// DELETE /api/value?path=stocks.TSLA
pub async fn delete_value(
    State(state): State<SharedState>,
    Query(query): Query<PathQuery>,
) -> Result<impl IntoResponse, AppError> {
    state.store.remove(&query.path).await?;

    Ok(Json(json!({
        "ok":       true,
        "path":     query.path,
        "revision": state.store.revision(),
    })))
}

/// GET /api/history/:symbol
pub async fn get_history(
    State(state): State<SharedState>,
    Path(symbol): Path<String>,
) -> impl IntoResponse {
    let points = state.store.history(&symbol).await;
    Json(json!({
        "ok":     true,
        "symbol": symbol,
        "count":  points.len(),
        "points": points,
    }))
}

/// GET /api/mutations
pub async fn get_mutations(State(state): State<SharedState>) -> impl IntoResponse {
    let analytics = state.store.analytics();
    let records = analytics.get_all();
    Json(json!({
        "ok":       true,
        "count":    records.len(),
        "capacity": analytics.capacity(),
        "rate":     analytics.rate(),
        "records":  records,
    }))
}
