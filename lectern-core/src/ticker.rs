//! Scheduled repeating callbacks that drive playback.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

const LOG_TARGET: &str = "lectern::ticker";

/// Callback invoked on every tick
pub type TickFn = Arc<dyn Fn() + Send + Sync>;

/// A single repeating schedule.
///
/// Starting replaces any schedule already running, so there is never more than
/// one. After [`TickSource::stop`] returns no further callback is started.
pub trait TickSource: Send + Sync {
    /// Invoke `on_tick` every `interval`, first after one full interval.
    fn start(&self, interval: Duration, on_tick: TickFn);

    fn stop(&self);

    fn is_running(&self) -> bool;
}

/// [`TickSource`] backed by a tokio interval task.
#[derive(Debug, Default)]
pub struct TokioTicker {
    running: Mutex<Option<CancellationToken>>,
}

impl TokioTicker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TickSource for TokioTicker {
    fn start(&self, interval: Duration, on_tick: TickFn) {
        let token = CancellationToken::new();
        let previous = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        trace!(target: LOG_TARGET, "Starting ticker every {:?}", interval);

        tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + interval, interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticks.tick() => on_tick(),
                }
            }
        });
    }

    fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = running {
            trace!(target: LOG_TARGET, "Stopping ticker");
            token.cancel();
        }
    }

    fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }
}

impl Drop for TokioTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, TickFn) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&count);
        let on_tick: TickFn = Arc::new(move || {
            handle.fetch_add(1, Ordering::SeqCst);
        });
        (count, on_tick)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_interval() {
        let ticker = TokioTicker::new();
        let (count, on_tick) = counter();

        ticker.start(Duration::from_millis(200), on_tick);
        assert!(ticker.is_running());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_stop() {
        let ticker = TokioTicker::new();
        let (count, on_tick) = counter();

        ticker.start(Duration::from_millis(200), on_tick);
        tokio::time::sleep(Duration::from_millis(500)).await;
        ticker.stop();
        assert!(!ticker.is_running());

        let seen = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
        assert_eq!(seen, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_schedule() {
        let ticker = TokioTicker::new();
        let (first, first_tick) = counter();
        let (second, second_tick) = counter();

        ticker.start(Duration::from_millis(200), first_tick);
        ticker.start(Duration::from_millis(200), second_tick);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 5);
    }
}
