//! # models::instrument
//!
//! Defines [`Instrument`], the tracked price series, and [`TradingState`], the
//! aggregate the reactive store owns.
//!
//! Field names serialize in camelCase so that dotted paths read the same way
//! the dashboard addresses them, e.g. `stocks.AAPL.price`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ─── Instrument ───────────────────────────────────────────────────────────────

/// One independently tracked instrument (a stock in the demo seed set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Instrument {
    /// Unique key, e.g. `"AAPL"`.
    pub symbol: String,
    /// Display name, e.g. `"Apple Inc."`.
    pub name: String,
    /// Current price.
    pub price: f64,
    /// Reference price the change metrics are measured against.
    pub previous_price: f64,
    pub volume: u64,
    /// Running session high.
    pub high: f64,
    /// Running session low.
    pub low: f64,
    /// `price - previous_price`, rounded to cents.
    pub change: f64,
    /// `change / previous_price` in percent, rounded to two decimals.
    pub change_percent: f64,
    /// Epoch milliseconds of the last update.
    pub last_updated: i64,
}

impl Instrument {
    /// `true` while the running range still brackets the current price.
    #[inline]
    pub fn range_holds(&self) -> bool {
        self.high >= self.price && self.price >= self.low
    }
}

// ─── MarketStatus ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarketStatus {
    #[default]
    Open,
    Closed,
    PreMarket,
}

// ─── TradingState ─────────────────────────────────────────────────────────────

/// Aggregate store state. This is also the persisted layout.
///
/// `selected_stock` is expected to reference a key of `stocks`; the store does
/// not enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TradingState {
    pub stocks: BTreeMap<String, Instrument>,
    pub market_status: MarketStatus,
    /// Epoch milliseconds of the last global refresh.
    pub last_refresh: i64,
    pub selected_stock: String,
}

impl TradingState {
    pub fn instrument(&self, symbol: &str) -> Option<&Instrument> {
        self.stocks.get(symbol)
    }

    pub fn selected(&self) -> Option<&Instrument> {
        self.stocks.get(&self.selected_stock)
    }
}

// ─── PricePoint ───────────────────────────────────────────────────────────────

/// One historical sample of an instrument, appended on every simulated update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: i64,
    pub price: f64,
    pub volume: u64,
}

/// Current time as Unix epoch milliseconds.
#[inline]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
