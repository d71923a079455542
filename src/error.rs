//! # error
//!
//! Error types for the store, the persistence layer and the HTTP surface.
//!
//! Only [`StoreError`] and [`AppError`] ever reach a caller. Persistence
//! failures are logged and handed to an optional hook; `save`/`load` never
//! return them.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// ─── Store ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    /// The dotted path does not resolve inside the state.
    #[error("Unknown path: {0}")]
    UnknownPath(String),

    /// The written value cannot be represented by the typed state.
    #[error("Incompatible value for '{path}': {source}")]
    IncompatibleValue {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The state could not be converted to its dynamic form.
    #[error("State encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

// ─── Persistence ──────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage I/O failed for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Malformed snapshot under key '{key}': {source}")]
    Deserialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

// ─── HTTP ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AppError {
    /// The request payload was syntactically correct but semantically invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Catch-all for unexpected failures.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownPath(path) => AppError::NotFound(format!("path '{path}'")),
            StoreError::IncompatibleValue { .. } => AppError::BadRequest(err.to_string()),
            StoreError::Encoding(e) => AppError::Internal(e.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {err}"),
            ),
        };

        let body = Json(json!({
            "ok":    false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
