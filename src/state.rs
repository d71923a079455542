//! # state
//!
//! [`AppState`] — the explicit context object built once at startup and
//! shared (as [`SharedState`]) with the HTTP handlers and the simulation
//! driver. There are no global store instances.
//!
//! ```text
//!  AppState
//!  ├─ store        Arc<TradingStore>   state · history · observers · analytics · persistence
//!  ├─ simulator    Simulator           repeating tick → store.mutate
//!  ├─ broadcast_tx                     WsEvent JSON → /ws/monitor clients
//!  └─ config
//! ```

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::Config;
use crate::engine::persistence::{FileStorage, PersistenceManager, Storage};
use crate::engine::simulator::Simulator;
use crate::error::StoreError;
use crate::events::WsEvent;
use crate::models::{Seed, TradingState};
use crate::store::TradingStore;

// ─── AppState ─────────────────────────────────────────────────────────────────

pub struct AppState {
    pub store: Arc<TradingStore>,
    pub simulator: Simulator,
    /// Pre-serialized [`WsEvent`]s for WebSocket clients.
    pub broadcast_tx: broadcast::Sender<String>,
    pub config: Config,
}

/// What the dashboard header shows.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStatus {
    pub state: TradingState,
    pub simulating: bool,
    pub revision: u64,
    pub mutation_count: usize,
    pub mutation_rate: f64,
    pub observer_count: usize,
}

impl AppState {
    /// File-backed persistence under `config.storage_dir`.
    pub fn new(config: Config) -> Self {
        let storage = Arc::new(FileStorage::new(config.storage_dir.clone()));
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: Config, storage: Arc<dyn Storage>) -> Self {
        let (broadcast_tx, _) = broadcast::channel(256);

        let failures = broadcast_tx.clone();
        let persistence = PersistenceManager::new(
            storage,
            config.storage_key.clone(),
            config.persist_debounce,
        )
        .with_error_hook(move |err| {
            let event = WsEvent::PersistenceFailed { error: err.to_string() };
            let _ = failures.send(event.to_json());
        });

        let store = Arc::new(TradingStore::new(Seed::default(), persistence, config.store));
        let simulator = Simulator::new(Arc::clone(&store), config.tick_interval);

        Self {
            store,
            simulator,
            broadcast_tx,
            config,
        }
    }

    /// Sends to every WebSocket client; no listener is not an error.
    pub fn broadcast(&self, event: &WsEvent) {
        let _ = self.broadcast_tx.send(event.to_json());
    }

    pub fn start_simulation(&self) -> bool {
        let started = self.simulator.start();
        if started {
            self.broadcast(&WsEvent::SimulationStarted);
        }
        started
    }

    pub fn stop_simulation(&self) -> bool {
        let stopped = self.simulator.stop();
        if stopped {
            self.broadcast(&WsEvent::SimulationStopped);
        }
        stopped
    }

    pub async fn select_instrument(&self, symbol: &str) -> Result<(), StoreError> {
        self.store.select_instrument(symbol).await?;
        self.broadcast(&WsEvent::InstrumentSelected { symbol: symbol.to_string() });
        Ok(())
    }

    /// Stops the simulation, then returns the store to its seed in one batch.
    pub async fn reset(&self) -> Result<(), StoreError> {
        self.stop_simulation();
        self.store.reset().await?;

        let state = self.store.snapshot().await;
        self.broadcast(&WsEvent::StateReset { state: Box::new(state) });
        info!("🔄 Dashboard reset");
        Ok(())
    }

    pub async fn status(&self) -> DashboardStatus {
        let analytics = self.store.analytics();
        DashboardStatus {
            state: self.store.snapshot().await,
            simulating: self.simulator.is_running(),
            revision: self.store.revision(),
            mutation_count: analytics.count(),
            mutation_rate: analytics.rate(),
            observer_count: self.store.observers().count(),
        }
    }
}

/// Convenience type alias
pub type SharedState = Arc<AppState>;

pub fn build_state(config: Config) -> SharedState {
    Arc::new(AppState::new(config))
}

// ─── Render Trigger ───────────────────────────────────────────────────────────

/// Turns store revisions into `STATE_CHANGED` broadcasts.
///
/// Bursts coalesce: a slow forwarder sees only the newest revision.
pub fn spawn_render_forwarder(state: SharedState) -> JoinHandle<()> {
    let mut revisions = state.store.subscribe_revisions();

    tokio::spawn(async move {
        while revisions.changed().await.is_ok() {
            let revision = *revisions.borrow_and_update();
            let snapshot = state.store.snapshot().await;
            let analytics = state.store.analytics();

            debug!(revision, "Forwarding state change to monitor clients");
            state.broadcast(&WsEvent::StateChanged {
                revision,
                state: Box::new(snapshot),
                mutation_count: analytics.count(),
                mutation_rate: analytics.rate(),
            });
        }
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::{json, Value};
    use tokio::time;

    use crate::engine::persistence::MemoryStorage;

    fn shared(storage: Arc<MemoryStorage>) -> SharedState {
        Arc::new(AppState::with_storage(Config::default(), storage))
    }

    #[tokio::test]
    async fn test_store_change_reaches_monitor_channel() {
        let state = shared(Arc::new(MemoryStorage::new()));
        let mut rx = state.broadcast_tx.subscribe();
        let forwarder = spawn_render_forwarder(Arc::clone(&state));

        state.store.set("stocks.AAPL.price", json!(200.0)).await.unwrap();

        let raw = time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let event: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(event["event"], "STATE_CHANGED");
        assert_eq!(event["state"]["stocks"]["AAPL"]["price"], 200.0);
        assert_eq!(event["mutation_count"], 1);

        forwarder.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stops_simulation_and_empties_everything() {
        let storage = Arc::new(MemoryStorage::new());
        let state = shared(Arc::clone(&storage));

        assert!(state.start_simulation());
        time::sleep(Duration::from_millis(4_600)).await;
        assert!(state.store.analytics().count() > 0);
        assert!(storage.raw(&state.config.storage_key).is_some());

        state.reset().await.unwrap();
        assert!(!state.simulator.is_running());

        let status = state.status().await;
        assert!(!status.simulating);
        assert_eq!(status.mutation_count, 0);
        assert_eq!(status.state.selected_stock, "AAPL");
        for (symbol, seeded) in &Seed::default().stocks {
            assert_eq!(status.state.stocks[symbol].price, seeded.price);
            assert!(state.store.history(symbol).await.is_empty());
        }

        time::sleep(Duration::from_millis(5_000)).await;
        assert!(storage.raw(&state.config.storage_key).is_none());
        assert_eq!(state.store.analytics().count(), 0);
    }

    #[tokio::test]
    async fn test_select_broadcasts_event() {
        let state = shared(Arc::new(MemoryStorage::new()));
        let mut rx = state.broadcast_tx.subscribe();

        state.select_instrument("TSLA").await.unwrap();

        let event: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(event["event"], "INSTRUMENT_SELECTED");
        assert_eq!(state.status().await.state.selected_stock, "TSLA");
    }
}
