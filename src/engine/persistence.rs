//! # engine::persistence
//!
//! **Persistence Adapter** — debounced snapshot writes to durable key/value
//! storage.
//!
//! ```text
//! save(s1) ──┐
//! save(s2) ──┼─ restarts the debounce timer each time
//! save(s3) ──┘
//!             └── 500 ms of quiet ──▶ serialize(s3) ──▶ storage.set(key)
//! ```
//!
//! Failures never reach the caller: they are logged and forwarded to the
//! optional error hook so a host can surface them.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use super::timer::Timer;
use crate::error::PersistenceError;

/// Key the dashboard state is stored under unless configured otherwise.
pub const DEFAULT_STORAGE_KEY: &str = "proxy-trading-state";

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

// ─── Storage ──────────────────────────────────────────────────────────────────

/// Synchronous string key/value storage, in the manner of browser local storage.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

fn io_error(key: &str) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io { key: key.to_string(), source }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key)(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir).map_err(io_error(key))?;
        // Write-then-rename so a crash never leaves a half-written snapshot.
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, value).map_err(io_error(key))?;
        fs::rename(&tmp, self.path_for(key)).map_err(io_error(key))
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(io_error(key)(e)),
            _ => Ok(()),
        }
    }
}

/// In-process storage; counts writes so tests can assert on debouncing.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.lock().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.lock().remove(key);
        Ok(())
    }
}

// ─── PersistenceManager ───────────────────────────────────────────────────────

pub type ErrorHook = Arc<dyn Fn(&PersistenceError) + Send + Sync>;

pub struct PersistenceManager {
    storage: Arc<dyn Storage>,
    key: String,
    debounce: Duration,
    pending: Mutex<Timer>,
    on_error: Option<ErrorHook>,
}

impl PersistenceManager {
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>, debounce: Duration) -> Self {
        Self {
            storage,
            key: key.into(),
            debounce,
            pending: Mutex::new(Timer::idle()),
            on_error: None,
        }
    }

    /// Installs a hook that sees every save/load/clear failure.
    pub fn with_error_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&PersistenceError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn report(&self, err: PersistenceError) {
        report(self.on_error.as_ref(), &err);
    }

    /// Schedules a debounced write of `state`.
    ///
    /// A call inside the debounce window cancels the pending write and starts
    /// the window over, so only the latest state is ever written. Must be
    /// called from within a Tokio runtime.
    pub fn save<T>(&self, state: T)
    where
        T: Serialize + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        let key = self.key.clone();
        let hook = self.on_error.clone();

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.cancel();
        *pending = Timer::once(self.debounce, move || {
            let result = serde_json::to_string(&state)
                .map_err(PersistenceError::Serialize)
                .and_then(|json| storage.set(&key, &json));
            match result {
                Ok(()) => debug!(key = %key, "Snapshot persisted"),
                Err(err) => report(hook.as_ref(), &err),
            }
        });
    }

    /// Whether a debounced write is waiting to fire.
    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_active()
    }

    /// Drops a pending write, if any.
    pub fn cancel_pending(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// `None` when nothing is stored or the stored content does not parse.
    pub fn load<T: DeserializeOwned>(&self) -> Option<T> {
        let raw = match self.storage.get(&self.key) {
            Ok(raw) => raw?,
            Err(err) => {
                self.report(err);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(source) => {
                self.report(PersistenceError::Deserialize { key: self.key.clone(), source });
                None
            }
        }
    }

    /// Removes the stored entry immediately.
    pub fn clear(&self) {
        if let Err(err) = self.storage.remove(&self.key) {
            self.report(err);
        }
    }
}

fn report(hook: Option<&ErrorHook>, err: &PersistenceError) {
    error!(error = %err, "Persistence failure");
    if let Some(hook) = hook {
        hook(err);
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
