//! # store
//!
//! **Reactive Store**: the single owner of [`TradingState`] and its
//! [`PriceHistory`].
//!
//! Every write goes through the store's mutation API: [`TradingStore::set`],
//! [`TradingStore::remove`] or [`TradingStore::mutate`]. Writers never call a
//! separate "notify" step. The write itself drives the pipeline:
//!
//! ```text
//!  mutate(|state, history| ...)
//!        │  (write lock held)
//!        ├─ project state → Value (before)
//!        ├─ run closure
//!        ├─ project state → Value (after), diff → [Mutation]
//!        └─ clone snapshot
//!        ├─ take the publish guard
//!        │  (lock released, consumers see only the final state)
//!        ├─▶ ObserverRegistry::notify   per mutation, registration order
//!        ├─▶ MutationLog::record        per mutation
//!        ├─▶ PersistenceManager::save   once per batch (debounced)
//!        └─▶ revision watch             once per batch (render trigger)
//! ```
//!
//! The publish guard is taken while the write lock is still held and kept
//! until fan-out ends, so batches publish in the order they committed and
//! the last persisted snapshot is always the latest state.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::engine::analytics::{self, MutationLog};
use crate::engine::observers::ObserverRegistry;
use crate::engine::path;
use crate::engine::persistence::PersistenceManager;
use crate::error::StoreError;
use crate::models::history::DEFAULT_HISTORY_CAPACITY;
use crate::models::{now_millis, Mutation, PriceHistory, PricePoint, Seed, TradingState};

// ─── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Records kept by the mutation log.
    pub log_capacity: usize,
    /// Price points kept per symbol.
    pub history_capacity: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            log_capacity: analytics::DEFAULT_CAPACITY,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

// ─── TradingStore ─────────────────────────────────────────────────────────────

struct Inner {
    state: TradingState,
    history: PriceHistory,
}

pub struct TradingStore {
    inner: RwLock<Inner>,
    seed: Seed,
    observers: ObserverRegistry,
    analytics: MutationLog,
    persistence: PersistenceManager,
    revision: watch::Sender<u64>,
    publishing: Mutex<()>,
}

impl TradingStore {
    /// Restores the persisted snapshot if there is one, else starts from `seed`.
    pub fn new(seed: Seed, persistence: PersistenceManager, options: StoreOptions) -> Self {
        let state = match persistence.load::<TradingState>() {
            Some(restored) => {
                info!(
                    key = persistence.key(),
                    instruments = restored.stocks.len(),
                    "Restored persisted trading state"
                );
                restored
            }
            None => seed.to_state(now_millis()),
        };

        let (revision, _) = watch::channel(0);

        Self {
            inner: RwLock::new(Inner {
                state,
                history: PriceHistory::new(options.history_capacity),
            }),
            seed,
            observers: ObserverRegistry::new(),
            analytics: MutationLog::new(options.log_capacity),
            persistence,
            revision,
            publishing: Mutex::new(()),
        }
    }

    // ── Collaborators ────────────────────────────────────────────────────────

    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    pub fn analytics(&self) -> &MutationLog {
        &self.analytics
    }

    pub fn persistence(&self) -> &PersistenceManager {
        &self.persistence
    }

    /// Bumped once after every committed batch, after fan-out has run.
    pub fn subscribe_revisions(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    /// Value at a dotted path, e.g. `stocks.AAPL.price`.
    pub async fn get(&self, path: &str) -> Option<Value> {
        let inner = self.inner.read().await;
        let doc = serde_json::to_value(&inner.state).ok()?;
        path::get(&doc, path).cloned()
    }

    pub async fn snapshot(&self) -> TradingState {
        self.inner.read().await.state.clone()
    }

    /// Price history of one symbol, oldest first.
    pub async fn history(&self, symbol: &str) -> Vec<PricePoint> {
        self.inner.read().await.history.points(symbol)
    }

    pub async fn histories(&self) -> BTreeMap<String, Vec<PricePoint>> {
        self.inner.read().await.history.to_map()
    }

    // ── Writes ───────────────────────────────────────────────────────────────

    /// Writes `value` at a dotted path.
    ///
    /// The value must fit the typed state (a number where a number lives, a
    /// whole instrument under `stocks.<SYMBOL>`); ranges are not checked.
    pub async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.write_document(path, |doc| path::set(doc, path, value)).await
    }

    /// Deletes the object key at a dotted path, e.g. `stocks.TSLA`.
    pub async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.write_document(path, |doc| path::remove(doc, path)).await
    }

    async fn write_document<F>(&self, target: &str, edit: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Value) -> Option<Value>,
    {
        let (changes, snapshot, order) = {
            let mut inner = self.inner.write().await;
            let before = serde_json::to_value(&inner.state)?;
            let mut doc = before.clone();
            edit(&mut doc).ok_or_else(|| StoreError::UnknownPath(target.to_string()))?;

            let next: TradingState = serde_json::from_value(doc).map_err(|source| {
                StoreError::IncompatibleValue { path: target.to_string(), source }
            })?;
            let after = serde_json::to_value(&next)?;
            inner.state = next;
            (path::diff(&before, &after), inner.state.clone(), self.publish_guard())
        };

        self.publish(changes, snapshot, true);
        drop(order);
        Ok(())
    }

    /// Runs `f` against the live state and history as one batch.
    ///
    /// All resulting mutations are delivered after `f` returns and the lock is
    /// released, so no consumer can observe a half-applied batch.
    pub async fn mutate<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut TradingState, &mut PriceHistory) -> R,
    {
        let (result, changes, snapshot, order) = {
            let mut inner = self.inner.write().await;
            let before = serde_json::to_value(&inner.state)?;
            let Inner { state, history } = &mut *inner;
            let result = f(state, history);
            let after = serde_json::to_value(&inner.state)?;
            let changes = path::diff(&before, &after);
            (result, changes, inner.state.clone(), self.publish_guard())
        };

        self.publish(changes, snapshot, true);
        drop(order);
        Ok(result)
    }

    /// Points the selection at `symbol`. Unknown symbols are accepted.
    pub async fn select_instrument(&self, symbol: &str) -> Result<(), StoreError> {
        let known = self
            .mutate(|state, _| {
                state.selected_stock = symbol.to_string();
                state.stocks.contains_key(symbol)
            })
            .await?;

        if !known {
            warn!(symbol, "Selected symbol is not a tracked instrument");
        }
        Ok(())
    }

    /// Returns every instrument and the selection to the seed, and empties
    /// the mutation log, the persisted snapshot and all price histories.
    ///
    /// Observers and the revision watch see the reset as one batch; it is not
    /// itself logged or persisted.
    pub async fn reset(&self) -> Result<(), StoreError> {
        let (changes, snapshot, order) = {
            let mut inner = self.inner.write().await;
            let before = serde_json::to_value(&inner.state)?;
            let market_status = inner.state.market_status;
            // Batches committed earlier finish publishing before the log and
            // storage are cleared.
            let order = self.publish_guard();
            self.persistence.cancel_pending();

            inner.state = self.seed.to_state(now_millis());
            inner.state.market_status = market_status;
            inner.history.clear();

            self.persistence.clear();
            self.analytics.clear();

            let after = serde_json::to_value(&inner.state)?;
            (path::diff(&before, &after), inner.state.clone(), order)
        };

        info!(changes = changes.len(), "Trading state reset to seed");
        self.publish(changes, snapshot, false);
        drop(order);
        Ok(())
    }

    // ── Fan-out ──────────────────────────────────────────────────────────────

    /// Must be taken under the write lock, never the other way round.
    fn publish_guard(&self) -> MutexGuard<'_, ()> {
        self.publishing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, changes: Vec<Mutation>, snapshot: TradingState, track: bool) {
        if changes.is_empty() {
            return;
        }
        debug!(changes = changes.len(), "Publishing store mutations");

        for change in changes {
            self.observers
                .notify(&change.property, &change.new_value, &change.old_value);
            if track {
                self.analytics.record(
                    &change.property,
                    change.old_value,
                    change.new_value,
                    change.action,
                );
            }
        }

        if track {
            self.persistence.save(snapshot);
        }
        self.revision.send_modify(|rev| *rev += 1);
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use serde_json::json;
    use tokio::time;

    use crate::engine::persistence::{MemoryStorage, DEFAULT_DEBOUNCE, DEFAULT_STORAGE_KEY};
    use crate::models::{MarketStatus, MutationAction};

    fn store_with(storage: &Arc<MemoryStorage>) -> TradingStore {
        let persistence =
            PersistenceManager::new(storage.clone(), DEFAULT_STORAGE_KEY, DEFAULT_DEBOUNCE);
        TradingStore::new(Seed::default(), persistence, StoreOptions::default())
    }

    #[tokio::test]
    async fn test_get_reads_dotted_paths() {
        let store = store_with(&Arc::new(MemoryStorage::new()));
        assert_eq!(store.get("stocks.AAPL.price").await, Some(json!(178.5)));
        assert_eq!(store.get("selectedStock").await, Some(json!("AAPL")));
        assert_eq!(store.get("stocks.NOPE").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_notifies_logs_and_persists() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(&storage);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.observers().subscribe(
            move |property, new_value, old_value| {
                sink.lock().unwrap().push((property.to_string(), new_value.clone(), old_value.clone()));
                Ok(())
            },
            Some("stocks.AAPL"),
        );
        let mut revisions = store.subscribe_revisions();

        store.set("stocks.AAPL.price", json!(190.0)).await.unwrap();
        store.set("stocks.MSFT.price", json!(400.0)).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("stocks.AAPL.price".to_string(), json!(190.0), json!(178.5))]
        );
        assert!(revisions.has_changed().unwrap());
        assert_eq!(store.revision(), 2);

        let log = store.analytics().get_all();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].property, "stocks.MSFT.price");
        assert_eq!(log[1].action, MutationAction::Set);

        time::sleep(Duration::from_millis(600)).await;
        assert_eq!(storage.write_count(), 1);
        let persisted: TradingState =
            serde_json::from_str(&storage.raw(DEFAULT_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(persisted.stocks["AAPL"].price, 190.0);
        assert_eq!(persisted.stocks["MSFT"].price, 400.0);
    }

    #[tokio::test]
    async fn test_set_rejects_unknown_or_incompatible() {
        let store = store_with(&Arc::new(MemoryStorage::new()));

        let err = store.set("stocks.NOPE.price", json!(1.0)).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownPath(_)));

        let err = store.set("stocks.AAPL.price", json!("cheap")).await.unwrap_err();
        assert!(matches!(err, StoreError::IncompatibleValue { .. }));

        let err = store.set("stocks.AAPL.nickname", json!("apple")).await.unwrap_err();
        assert!(matches!(err, StoreError::IncompatibleValue { .. }));

        assert_eq!(store.analytics().count(), 0);
        assert_eq!(store.get("stocks.AAPL.price").await, Some(json!(178.5)));
    }

    #[tokio::test]
    async fn test_zero_reference_price_does_not_block_writes() {
        use crate::engine::simulator;
        use rand::{rngs::StdRng, SeedableRng};

        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(&storage);
        store.set("stocks.AAPL.previousPrice", json!(0.0)).await.unwrap();

        let mut rng = StdRng::seed_from_u64(21);
        for n in 0..20 {
            store
                .mutate(|state, history| {
                    let aapl = state.stocks.get_mut("AAPL").unwrap();
                    let point = simulator::apply_update(aapl, n, &mut rng);
                    history.push("AAPL", point);
                })
                .await
                .unwrap();
        }

        assert_eq!(store.get("stocks.AAPL.changePercent").await, Some(json!(0.0)));
        store.set("selectedStock", json!("MSFT")).await.unwrap();
        store.remove("stocks.TSLA").await.unwrap();
        assert_eq!(store.snapshot().await.selected_stock, "MSFT");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_publish_in_commit_order() {
        for round in 0..50_u64 {
            let storage = Arc::new(MemoryStorage::new());
            let persistence =
                PersistenceManager::new(storage.clone(), DEFAULT_STORAGE_KEY, Duration::from_millis(20));
            let store = Arc::new(TradingStore::new(Seed::default(), persistence, StoreOptions::default()));

            let writers: Vec<_> = (0..8_u64)
                .map(|i| {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move {
                        store
                            .set("stocks.AAPL.volume", json!(round * 100 + i + 1))
                            .await
                            .unwrap();
                    })
                })
                .collect();
            for writer in writers {
                writer.await.unwrap();
            }
            time::sleep(Duration::from_millis(80)).await;

            let live = store.snapshot().await.stocks["AAPL"].volume;
            let persisted: TradingState =
                serde_json::from_str(&storage.raw(DEFAULT_STORAGE_KEY).unwrap()).unwrap();
            let newest = store.analytics().get_all().pop().unwrap();

            assert_eq!(persisted.stocks["AAPL"].volume, live, "round {round}");
            assert_eq!(newest.new_value, json!(live), "round {round}");
        }
    }

    #[tokio::test]
    async fn test_set_does_not_validate_ranges() {
        let store = store_with(&Arc::new(MemoryStorage::new()));
        store.set("stocks.AAPL.price", json!(-5.0)).await.unwrap();
        assert_eq!(store.snapshot().await.stocks["AAPL"].price, -5.0);
    }

    #[tokio::test]
    async fn test_remove_records_delete() {
        let store = store_with(&Arc::new(MemoryStorage::new()));
        store.remove("stocks.TSLA").await.unwrap();

        assert!(!store.snapshot().await.stocks.contains_key("TSLA"));
        let log = store.analytics().get_all();
        assert!(log
            .iter()
            .all(|r| r.property.starts_with("stocks.TSLA") && r.action == MutationAction::Delete));
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_mutate_is_one_batch() {
        let store = store_with(&Arc::new(MemoryStorage::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        store.observers().subscribe(
            move |_, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            None,
        );

        store
            .mutate(|state, history| {
                state.market_status = MarketStatus::Closed;
                state.last_refresh += 1;
                history.push("AAPL", PricePoint { timestamp: 1, price: 1.0, volume: 1 });
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.revision(), 1);
        assert_eq!(store.history("AAPL").await.len(), 1);
    }

    #[tokio::test]
    async fn test_noop_mutation_publishes_nothing() {
        let store = store_with(&Arc::new(MemoryStorage::new()));
        store.mutate(|_, _| ()).await.unwrap();
        assert_eq!(store.revision(), 0);
        assert_eq!(store.analytics().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restores_persisted_state() {
        let storage = Arc::new(MemoryStorage::new());
        {
            let store = store_with(&storage);
            store.select_instrument("MSFT").await.unwrap();
            time::sleep(Duration::from_millis(600)).await;
        }

        let restored = store_with(&storage);
        assert_eq!(restored.snapshot().await.selected_stock, "MSFT");
    }

    #[tokio::test]
    async fn test_select_accepts_unknown_symbol() {
        let store = store_with(&Arc::new(MemoryStorage::new()));
        store.select_instrument("ZZZ").await.unwrap();
        assert_eq!(store.snapshot().await.selected_stock, "ZZZ");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_restores_seed_and_clears_everything() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(&storage);

        store.set("stocks.AAPL.price", json!(1.0)).await.unwrap();
        store.remove("stocks.TSLA").await.unwrap();
        store
            .mutate(|state, history| {
                state.selected_stock = "GOOGL".into();
                history.push("GOOGL", PricePoint { timestamp: 1, price: 1.0, volume: 1 });
            })
            .await
            .unwrap();
        time::sleep(Duration::from_millis(600)).await;
        assert!(storage.raw(DEFAULT_STORAGE_KEY).is_some());

        store.set("stocks.MSFT.price", json!(2.0)).await.unwrap();
        store.reset().await.unwrap();
        time::sleep(Duration::from_millis(600)).await;

        let state = store.snapshot().await;
        let seed = Seed::default();
        for (symbol, instrument) in &seed.stocks {
            assert_eq!(state.stocks[symbol].price, instrument.price);
        }
        assert_eq!(state.stocks.len(), seed.stocks.len());
        assert_eq!(state.selected_stock, "AAPL");
        assert_eq!(store.analytics().count(), 0);
        assert!(store.histories().await.values().all(Vec::is_empty));
        assert!(storage.raw(DEFAULT_STORAGE_KEY).is_none());
    }
}
