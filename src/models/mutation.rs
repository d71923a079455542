//! # models::mutation
//!
//! [`Mutation`] is what observers receive; [`MutationRecord`] is what the
//! analytics log keeps.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Kind of write that produced a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationAction {
    /// A value was written (changed or added).
    Set,
    /// A key was removed.
    Delete,
}

/// One leaf-level change detected by the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    /// Dotted path, e.g. `stocks.AAPL.price`.
    pub property: String,
    /// `Value::Null` when the key did not exist before.
    pub old_value: Value,
    /// `Value::Null` for deletes.
    pub new_value: Value,
    pub action: MutationAction,
}

/// Immutable analytics entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRecord {
    pub id: Uuid,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub property: String,
    pub old_value: Value,
    pub new_value: Value,
    pub action: MutationAction,
}
