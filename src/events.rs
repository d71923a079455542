//! # events
//!
//! Defines [`WsEvent`] — every event pushed to dashboard clients over the
//! `/ws/monitor` WebSocket.
//!
//! Events travel through a `tokio::sync::broadcast::Sender<String>` as
//! pre-serialized JSON so every subscriber gets the same bytes.

use serde::Serialize;

use crate::models::TradingState;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WsEvent {
    /// A store batch committed; clients should re-render.
    StateChanged {
        revision: u64,
        state: Box<TradingState>,
        mutation_count: usize,
        mutation_rate: f64,
    },

    SimulationStarted,

    SimulationStopped,

    /// Instruments, selection, mutation log and histories are back to seed.
    StateReset {
        state: Box<TradingState>,
    },

    InstrumentSelected {
        symbol: String,
    },

    /// Best-effort persistence failed; in-memory state is unaffected.
    PersistenceFailed {
        error: String,
    },
}

impl WsEvent {
    #[inline]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"event":"SERIALIZATION_ERROR"}"#.to_string())
    }
}
