//! # proxyboard
//!
//! Reactive trading-dashboard state engine: an observable store with
//! dotted-path mutation tracking, a bounded mutation log, per-instrument
//! price history, debounced persistence and a random-walk price simulator,
//! served over HTTP and a monitor WebSocket.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
