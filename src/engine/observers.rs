//! # engine::observers
//!
//! **Observer Registry** — pub/sub fan-out for store mutations.
//!
//! Callbacks are invoked in registration order. Each one may be scoped to a
//! property prefix (`"stocks.AAPL"` only sees `stocks.AAPL.*`). A callback
//! that fails or panics is logged with its id and the remaining callbacks
//! still run; nothing is propagated to the caller of [`ObserverRegistry::notify`].

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tracing::error;

/// What an observer callback returns. Errors are logged, never propagated.
pub type ObserverResult = anyhow::Result<()>;

/// `(property, new_value, old_value)`
pub type ObserverCallback = Arc<dyn Fn(&str, &Value, &Value) -> ObserverResult + Send + Sync>;

// ─── ObserverId ───────────────────────────────────────────────────────────────

/// Counter-based id; never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer_{}", self.0)
    }
}

// ─── Registry ─────────────────────────────────────────────────────────────────

struct Observer {
    callback: ObserverCallback,
    filter: Option<String>,
}

impl Observer {
    fn accepts(&self, property: &str) -> bool {
        self.filter
            .as_deref()
            .map_or(true, |prefix| property.starts_with(prefix))
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    // Ids are monotonic, so key order is registration order.
    observers: BTreeMap<ObserverId, Observer>,
}

#[derive(Default)]
pub struct ObserverRegistry {
    inner: Mutex<Inner>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `callback`, optionally limited to properties starting with `filter`.
    pub fn subscribe<F>(&self, callback: F, filter: Option<&str>) -> ObserverId
    where
        F: Fn(&str, &Value, &Value) -> ObserverResult + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = ObserverId(inner.next_id);
        inner.observers.insert(
            id,
            Observer {
                callback: Arc::new(callback),
                filter: filter.map(str::to_owned),
            },
        );
        id
    }

    /// Returns whether an observer was removed.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.lock().observers.remove(&id).is_some()
    }

    pub fn notify(&self, property: &str, new_value: &Value, old_value: &Value) {
        // Callbacks run outside the lock so they may (un)subscribe themselves.
        let targets: Vec<(ObserverId, ObserverCallback)> = self
            .lock()
            .observers
            .iter()
            .filter(|(_, o)| o.accepts(property))
            .map(|(id, o)| (*id, Arc::clone(&o.callback)))
            .collect();

        for (id, callback) in targets {
            match catch_unwind(AssertUnwindSafe(|| callback(property, new_value, old_value))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(observer = %id, property, error = %err, "Observer callback failed");
                }
                Err(_) => {
                    error!(observer = %id, property, "Observer callback panicked");
                }
            }
        }
    }

    pub fn count(&self) -> usize {
        self.lock().observers.len()
    }

    pub fn clear(&self) {
        self.lock().observers.clear();
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
