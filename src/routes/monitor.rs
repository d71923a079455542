//! # routes::monitor
//!
//! `/ws/monitor` — live event stream for dashboard clients.
//!
//! On connect the client gets one `SNAPSHOT` frame (state, histories,
//! simulation flag, mutation stats), then every broadcast [`WsEvent`]
//! as a JSON text frame.
//!
//! [`WsEvent`]: crate::events::WsEvent

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::state::{AppState, SharedState};

pub async fn ws_monitor(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// The first frame a new client receives.
pub async fn snapshot(state: &AppState) -> Value {
    let analytics = state.store.analytics();
    json!({
        "event":          "SNAPSHOT",
        "state":          state.store.snapshot().await,
        "histories":      state.store.histories().await,
        "simulating":     state.simulator.is_running(),
        "revision":       state.store.revision(),
        "mutation_count": analytics.count(),
        "mutation_rate":  analytics.rate(),
    })
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    // Subscribe before the snapshot so nothing committed in between is lost.
    let mut rx = state.broadcast_tx.subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!("🔌 Monitor client connected");

    let first = snapshot(&state).await.to_string();
    if sender.send(Message::Text(first)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(json_str) => {
                        if sender.send(Message::Text(json_str)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!("Monitor client lagged, skipped {n} events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            result = receiver.next() => {
                match result {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("🔌 Monitor client disconnected");
}
