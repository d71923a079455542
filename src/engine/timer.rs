//! # engine::timer
//!
//! Cancellable timers on top of the Tokio runtime.
//!
//! A [`Timer`] owns at most one pending task. Both the debounced persistence
//! write and the simulation ticker go through it, so "cancel the pending
//! timer" means the same thing everywhere:
//!
//! * `cancel()` is idempotent and can be called on an idle timer.
//! * Once `cancel()` returns, the callback is never started again.
//! * Dropping a `Timer` cancels it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

#[derive(Debug, Default)]
pub struct Timer {
    handle: Option<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
}

impl Timer {
    /// A timer with nothing scheduled.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Runs `task` once after `delay`.
    pub fn once<F>(delay: Duration, task: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            if !flag.load(Ordering::Acquire) {
                task();
            }
        });

        Self { handle: Some(handle), cancelled }
    }

    /// Runs `task` every `period`, the first run one full period from now.
    ///
    /// Runs never overlap: the next one is only awaited after the previous
    /// future completed. A slow run delays the following ones instead of
    /// bursting to catch up.
    pub fn repeating<F, Fut>(period: Duration, mut task: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                task().await;
            }
        });

        Self { handle: Some(handle), cancelled }
    }

    /// Whether a callback is still pending.
    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::Acquire)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_once_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        let timer = Timer::once(Duration::from_millis(500), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });

        time::sleep(Duration::from_millis(499)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(timer.is_active());

        time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        let mut timer = Timer::once(Duration::from_millis(100), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });

        timer.cancel();
        timer.cancel();
        assert!(!timer.is_active());

        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let mut idle = Timer::idle();
        idle.cancel();
        assert!(!idle.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_stops_on_cancel() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let t = Arc::clone(&ticks);
        let mut timer = Timer::repeating(Duration::from_millis(1500), move || {
            let t = Arc::clone(&t);
            async move {
                t.fetch_add(1, Ordering::SeqCst);
            }
        });

        time::sleep(Duration::from_millis(1400)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(3200)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        timer.cancel();
        time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }
}
