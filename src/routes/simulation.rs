//! # routes::simulation
//!
//! User actions: start/stop the simulation, reset, select an instrument.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::{error::AppError, state::SharedState};

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub symbol: String,
}

/// POST /api/simulation/start. No-op when already running.
pub async fn start(State(state): State<SharedState>) -> impl IntoResponse {
    let started = state.start_simulation();
    Json(json!({
        "ok":         true,
        "changed":    started,
        "simulating": state.simulator.is_running(),
    }))
}

/// POST /api/simulation/stop. No-op when idle.
pub async fn stop(State(state): State<SharedState>) -> impl IntoResponse {
    let stopped = state.stop_simulation();
    Json(json!({
        "ok":         true,
        "changed":    stopped,
        "simulating": state.simulator.is_running(),
    }))
}

/// POST /api/reset
pub async fn reset(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    state.reset().await?;
    Ok(Json(json!({
        "ok":      true,
        "message": "State reset to seed.",
    })))
}

/// POST /api/select
pub async fn select(
    State(state): State<SharedState>,
    Json(request): Json<SelectRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.select_instrument(&request.symbol).await?;
    Ok(Json(json!({
        "ok":       true,
        "selected": request.symbol,
    })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::engine::persistence::MemoryStorage;
    use crate::routes::router;
    use crate::state::AppState;

    async fn post(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_halts() {
        let state = Arc::new(AppState::with_storage(Config::default(), Arc::new(MemoryStorage::new())));
        let app = router(Arc::clone(&state));

        let (_, body) = post(&app, "/api/simulation/start", "").await;
        assert_eq!(body["changed"], true);
        let (_, body) = post(&app, "/api/simulation/start", "").await;
        assert_eq!(body["changed"], false);
        assert_eq!(body["simulating"], true);

        let (_, body) = post(&app, "/api/simulation/stop", "").await;
        assert_eq!(body["simulating"], false);
        let (_, body) = post(&app, "/api/simulation/stop", "").await;
        assert_eq!(body["changed"], false);
    }

    #[tokio::test]
    async fn test_select_and_reset() {
        let state = Arc::new(AppState::with_storage(Config::default(), Arc::new(MemoryStorage::new())));
        let app = router(Arc::clone(&state));

        let (status, _) = post(&app, "/api/select", r#"{"symbol":"AMZN"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.store.snapshot().await.selected_stock, "AMZN");

        let (status, body) = post(&app, "/api/reset", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(state.store.snapshot().await.selected_stock, "AAPL");
        assert_eq!(state.store.analytics().count(), 0);
    }
}
