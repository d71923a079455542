//! Domain models shared across the store, the simulator and the dashboard API.

pub mod history;
pub mod instrument;
pub mod mutation;
pub mod seed;

pub use history::PriceHistory;
pub use instrument::{now_millis, Instrument, MarketStatus, PricePoint, TradingState};
pub use mutation::{Mutation, MutationAction, MutationRecord};
pub use seed::Seed;
