//! Injectable time sources.
//!
//! The runner never calls `Instant::now()` directly; it asks a [`Clock`].
//! [`SystemClock`] is the production default, [`ManualClock`] makes timing
//! deterministic in tests, and [`TickingClock`] trades resolution for a
//! cheaper read by caching a timestamp refreshed from a background task.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Provider of the current instant.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// Reads the monotonic system clock on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_ns: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_ns: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ns
            .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_ns.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}

/// A cached clock refreshed every `resolution` by a tokio task.
///
/// Reads are a single atomic load. The value lags real time by up to one
/// tick, so costs below the resolution collapse to zero.
pub struct TickingClock {
    origin: Instant,
    elapsed_ns: Arc<AtomicU64>,
    resolution: Duration,
    ticker: JoinHandle<()>,
}

impl TickingClock {
    /// Start the refresh task. Must be called from within a tokio runtime.
    pub fn start(resolution: Duration) -> Self {
        let origin = Instant::now();
        let elapsed_ns = Arc::new(AtomicU64::new(0));
        let shared = Arc::clone(&elapsed_ns);
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(resolution);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                shared.store(origin.elapsed().as_nanos() as u64, Ordering::Relaxed);
            }
        });
        Self {
            origin,
            elapsed_ns,
            resolution,
            ticker,
        }
    }

    pub fn resolution(&self) -> Duration {
        self.resolution
    }
}

impl Clock for TickingClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_nanos(self.elapsed_ns.load(Ordering::Relaxed))
    }
}

impl fmt::Debug for TickingClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickingClock")
            .field("resolution", &self.resolution)
            .finish()
    }
}

impl Drop for TickingClock {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_only_moves_on_advance() {
        let clock = ManualClock::new();
        let start = clock.now();
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_nanos(250));
        assert_eq!(clock.now() - start, Duration::from_nanos(250));
        assert_eq!(clock.elapsed(), Duration::from_nanos(250));
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[tokio::test]
    async fn test_ticking_clock_advances() {
        let clock = TickingClock::start(Duration::from_millis(1));
        assert_eq!(clock.resolution(), Duration::from_millis(1));
        let first = clock.now();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let second = clock.now();
        assert!(second > first, "cached clock should have ticked");
        assert!(second <= Instant::now());
    }
}
