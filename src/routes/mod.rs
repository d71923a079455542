//! HTTP + WebSocket surface of the dashboard.

pub mod dashboard;
pub mod monitor;
pub mod simulation;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::SharedState;

/// All routes, without middleware.
pub fn router(state: SharedState) -> Router {
    Router::new()
        // ── Reads & explicit writes ──────────────────────────────────────────
        .route("/api/health",               get(dashboard::health_check))
        .route("/api/state",                get(dashboard::get_state))
        .route(
            "/api/value",
            get(dashboard::get_value)
                .post(dashboard::set_value)
                .delete(dashboard::delete_value),
        )
        .route("/api/history/:symbol",      get(dashboard::get_history))
        .route("/api/mutations",            get(dashboard::get_mutations))
        // ── User actions ─────────────────────────────────────────────────────
        .route("/api/simulation/start",     post(simulation::start))
        .route("/api/simulation/stop",      post(simulation::stop))
        .route("/api/reset",                post(simulation::reset))
        .route("/api/select",               post(simulation::select))
        // ── Monitor ──────────────────────────────────────────────────────────
        .route("/ws/monitor",               get(monitor::ws_monitor))
        .with_state(state)
}
