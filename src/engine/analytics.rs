//! # engine::analytics
//!
//! **Mutation Log** — a bounded, timestamped record of every store mutation.
//!
//! The log is a drop-oldest FIFO: once it holds `capacity` records, each new
//! record evicts the oldest one. The recent mutation rate is derived from the
//! records themselves (trailing 10-second window) rather than kept as a
//! separate counter.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use uuid::Uuid;

use crate::models::{now_millis, MutationAction, MutationRecord};

/// Default number of records kept.
pub const DEFAULT_CAPACITY: usize = 200;

/// Width of the window `rate()` looks back over.
pub const RATE_WINDOW_MS: i64 = 10_000;

pub struct MutationLog {
    records: Mutex<VecDeque<MutationRecord>>,
    capacity: usize,
}

impl MutationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<MutationRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, property: &str, old_value: Value, new_value: Value, action: MutationAction) {
        self.record_at(now_millis(), property, old_value, new_value, action);
    }

    /// Same as [`record`](Self::record) with an explicit timestamp.
    pub fn record_at(
        &self,
        timestamp: i64,
        property: &str,
        old_value: Value,
        new_value: Value,
        action: MutationAction,
    ) {
        let mut records = self.lock();
        records.push_back(MutationRecord {
            id: Uuid::new_v4(),
            timestamp,
            property: property.to_string(),
            old_value,
            new_value,
            action,
        });
        while records.len() > self.capacity {
            records.pop_front();
        }
    }

    /// Oldest first.
    pub fn get_all(&self) -> Vec<MutationRecord> {
        self.lock().iter().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Mutations per second over the last 10 seconds, one decimal.
    pub fn rate(&self) -> f64 {
        self.rate_at(now_millis())
    }

    pub fn rate_at(&self, now: i64) -> f64 {
        let cutoff = now - RATE_WINDOW_MS;
        let recent = self.lock().iter().filter(|r| r.timestamp > cutoff).count();
        let per_sec = recent as f64 / (RATE_WINDOW_MS as f64 / 1000.0);
        (per_sec * 10.0).round() / 10.0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Default for MutationLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
