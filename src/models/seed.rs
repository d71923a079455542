//! # models::seed
//!
//! The fixed seed set the store starts from (and returns to on reset).

use std::collections::BTreeMap;

use super::instrument::{now_millis, Instrument, MarketStatus, TradingState};

/// Symbol selected on a fresh start and after reset.
pub const DEFAULT_SELECTION: &str = "AAPL";

/// Rows: symbol, name, price, previous price, volume, high, low, change, change %.
const SEED_ROWS: [(&str, &str, f64, f64, u64, f64, f64, f64, f64); 5] = [
    ("AAPL",  "Apple Inc.",      178.5, 176.2, 52_340_000, 180.1, 175.8,  2.3,  1.31),
    ("GOOGL", "Alphabet Inc.",   141.8, 140.5, 28_120_000, 143.2, 139.9,  1.3,  0.93),
    ("MSFT",  "Microsoft Corp.", 378.9, 375.6, 31_560_000, 381.4, 374.2,  3.3,  0.88),
    ("TSLA",  "Tesla Inc.",      248.2, 252.1, 89_450_000, 254.3, 245.6, -3.9, -1.55),
    ("AMZN",  "Amazon.com Inc.", 185.6, 183.4, 45_780_000, 187.2, 182.1,  2.2,  1.2),
];

/// What a store is (re)initialised from.
#[derive(Debug, Clone)]
pub struct Seed {
    pub stocks: BTreeMap<String, Instrument>,
    pub selection: String,
}

impl Seed {
    pub fn new(stocks: impl IntoIterator<Item = Instrument>, selection: impl Into<String>) -> Self {
        Self {
            stocks: stocks.into_iter().map(|i| (i.symbol.clone(), i)).collect(),
            selection: selection.into(),
        }
    }

    /// A fresh state built from a deep copy of the seed, stamped `now`.
    pub fn to_state(&self, now: i64) -> TradingState {
        TradingState {
            stocks: self.stocks.clone(),
            market_status: MarketStatus::Open,
            last_refresh: now,
            selected_stock: self.selection.clone(),
        }
    }
}

impl Default for Seed {
    fn default() -> Self {
        Self::new(initial_stocks(), DEFAULT_SELECTION)
    }
}

/// The five demo instruments.
pub fn initial_stocks() -> Vec<Instrument> {
    let now = now_millis();
    SEED_ROWS
        .iter()
        .map(|&(symbol, name, price, previous_price, volume, high, low, change, change_percent)| {
            Instrument {
                symbol: symbol.to_string(),
                name: name.to_string(),
                price,
                previous_price,
                volume,
                high,
                low,
                change,
                change_percent,
                last_updated: now,
            }
        })
        .collect()
}

pub fn initial_state() -> TradingState {
    Seed::default().to_state(now_millis())
}
