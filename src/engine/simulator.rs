//! # engine::simulator
//!
//! **Simulation Driver** — a repeating timer that random-walks instrument
//! prices through the store.
//!
//! ```text
//!   Idle ──start()──▶ Running ──stop()──▶ Idle
//!    ▲  stop() no-op     │ start() no-op
//!    └───────────────────┘
//!
//! every tick (1500 ms):
//!   pick 1 or 2 symbols (uniform, with replacement)
//!     ├─ price'  = round2(price · (1 + pct/100)),  pct = (u − 0.48) · 4
//!     ├─ change  = round2(price' − previousPrice), changePercent from change
//!     ├─ volume' = max(0, volume + ⌊(u − 0.3) · 500 000⌋)
//!     ├─ high/low widened to include price'
//!     └─ PricePoint appended to the symbol's history
//!   lastRefresh = now
//! ```
//!
//! The 0.48 centre gives the walk a slight upward drift; this is a demo
//! feed, not a market model.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info};

use super::timer::Timer;
use crate::models::{now_millis, Instrument, PriceHistory, PricePoint, TradingState};
use crate::store::TradingStore;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1500);

const DRIFT_CENTER: f64 = 0.48;
const MAX_SWING_PCT: f64 = 4.0;
const VOLUME_CENTER: f64 = 0.3;
const VOLUME_SPREAD: f64 = 500_000.0;

// ─── Update Rules ─────────────────────────────────────────────────────────────

#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Next price of a bounded random walk, rounded to cents. A step that
/// would overflow leaves the price where it is.
pub fn simulate_price_change<R: Rng + ?Sized>(price: f64, rng: &mut R) -> f64 {
    let change_pct = (rng.gen::<f64>() - DRIFT_CENTER) * MAX_SWING_PCT;
    let next = round2(price + price * (change_pct / 100.0));
    if next.is_finite() {
        next
    } else {
        price
    }
}

/// Percent move of `change` against `reference`, rounded to 2 places.
///
/// A zero reference has no defined percentage and reports `0.0`; the state
/// only ever holds finite numbers.
pub fn percent_of(change: f64, reference: f64) -> f64 {
    let percent = ((change / reference) * 10_000.0).round() / 100.0;
    if percent.is_finite() {
        percent
    } else {
        0.0
    }
}

/// Moves one instrument a step and returns the sample to record.
pub fn apply_update<R: Rng + ?Sized>(instrument: &mut Instrument, now: i64, rng: &mut R) -> PricePoint {
    let price = simulate_price_change(instrument.price, rng);
    let change = round2(price - instrument.previous_price);
    let change_percent = percent_of(change, instrument.previous_price);
    let volume_delta = ((rng.gen::<f64>() - VOLUME_CENTER) * VOLUME_SPREAD).floor() as i64;
    let volume = (instrument.volume as i64).saturating_add(volume_delta).max(0) as u64;

    instrument.price = price;
    instrument.change = change;
    instrument.change_percent = change_percent;
    instrument.volume = volume;
    instrument.high = instrument.high.max(price);
    instrument.low = instrument.low.min(price);
    instrument.last_updated = now;

    PricePoint { timestamp: now, price, volume }
}

/// One simulation step over the whole state. Returns the symbols touched, in
/// the order they were updated.
pub fn tick<R: Rng + ?Sized>(
    state: &mut TradingState,
    history: &mut PriceHistory,
    now: i64,
    rng: &mut R,
) -> Vec<String> {
    let symbols: Vec<String> = state.stocks.keys().cloned().collect();
    let mut touched = Vec::with_capacity(2);

    if !symbols.is_empty() {
        let count = if rng.gen::<f64>() > 0.5 { 2 } else { 1 };
        for _ in 0..count {
            let symbol = &symbols[rng.gen_range(0..symbols.len())];
            if let Some(instrument) = state.stocks.get_mut(symbol) {
                let point = apply_update(instrument, now, rng);
                history.push(symbol, point);
                touched.push(symbol.clone());
            }
        }
    }

    state.last_refresh = now;
    touched
}

// ─── Driver ───────────────────────────────────────────────────────────────────

pub struct Simulator {
    store: Arc<TradingStore>,
    period: Duration,
    rng: Arc<Mutex<StdRng>>,
    timer: Mutex<Timer>,
    /// Checked under the store's write lock before a timer tick mutates.
    running: Arc<AtomicBool>,
}

impl Simulator {
    pub fn new(store: Arc<TradingStore>, period: Duration) -> Self {
        Self::with_rng(store, period, StdRng::from_entropy())
    }

    /// Uses `rng` for every tick; a seeded one makes runs reproducible.
    pub fn with_rng(store: Arc<TradingStore>, period: Duration, rng: StdRng) -> Self {
        Self {
            store,
            period,
            rng: Arc::new(Mutex::new(rng)),
            timer: Mutex::new(Timer::idle()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Idle → Running. Returns `false` if it was already running.
    pub fn start(&self) -> bool {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.is_active() {
            return false;
        }

        self.running.store(true, Ordering::Release);
        let store = Arc::clone(&self.store);
        let rng = Arc::clone(&self.rng);
        let running = Arc::clone(&self.running);
        *timer = Timer::repeating(self.period, move || {
            let store = Arc::clone(&store);
            let rng = Arc::clone(&rng);
            let running = Arc::clone(&running);
            async move {
                run_tick(&store, &rng, Some(&running)).await;
            }
        });

        info!(period = ?self.period, "▶️ Simulation started");
        true
    }

    /// Running → Idle. Returns `false` if it was already idle.
    ///
    /// A tick that already holds the store's write lock may still commit, and
    /// is published before any later write. No tick takes the lock and
    /// mutates after this returns.
    pub fn stop(&self) -> bool {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if !timer.is_active() {
            return false;
        }
        self.running.store(false, Ordering::Release);
        timer.cancel();
        info!("⏹️ Simulation stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_active()
    }

    /// Runs a single tick right away, outside the timer.
    pub async fn tick_once(&self) -> Vec<String> {
        run_tick(&self.store, &self.rng, None).await
    }
}

/// `gate`, when given, must still be set once the write lock is held.
async fn run_tick(store: &TradingStore, rng: &Mutex<StdRng>, gate: Option<&AtomicBool>) -> Vec<String> {
    let result = store
        .mutate(|state, history| {
            if gate.is_some_and(|running| !running.load(Ordering::Acquire)) {
                return Vec::new();
            }
            let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
            tick(state, history, now_millis(), &mut *rng)
        })
        .await;

    match result {
        Ok(touched) => {
            debug!(symbols = ?touched, "Simulation tick");
            touched
        }
        Err(err) => {
            error!(error = %err, "Simulation tick failed");
            Vec::new()
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
