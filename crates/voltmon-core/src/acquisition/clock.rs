//! Monotonic microsecond time source
//!
//! The capture loop only needs two things from time: "what is now" and
//! "wait this long". Keeping them behind a trait lets simulation and tests
//! run capture windows without real sleeps.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock with microsecond resolution
pub trait Clock: Send {
    /// Microseconds since an arbitrary fixed origin; never decreases
    fn now_us(&self) -> i64;

    /// Block the calling thread for `us` microseconds
    fn delay_us(&self, us: u64);
}

/// Wall-time clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_us(&self) -> i64 {
        self.origin.elapsed().as_micros() as i64
    }

    fn delay_us(&self, us: u64) {
        std::thread::sleep(Duration::from_micros(us));
    }
}

/// Clock advanced by hand
///
/// `delay_us` returns immediately after moving time forward, so a whole
/// capture window completes instantly. Clones share the same time, which
/// lets a simulated front end charge read latency against the clock the
/// sampler is scheduling with.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at a specific time
    pub fn starting_at(us: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(us)),
        }
    }

    /// Move time forward without sleeping
    pub fn advance_us(&self, us: u64) {
        self.now.fetch_add(us as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    fn delay_us(&self, us: u64) {
        self.advance_us(us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = MonotonicClock::new();
        let t0 = clock.now_us();
        clock.delay_us(200);
        assert!(clock.now_us() >= t0 + 200);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::starting_at(1_000);
        let other = clock.clone();
        other.delay_us(500);
        assert_eq!(clock.now_us(), 1_500);
    }
}
