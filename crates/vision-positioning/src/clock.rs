//! Time sources for the solver's wall-clock bound.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source. Readings are relative to an arbitrary origin and
/// never decrease.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Real monotonic clock backed by [`Instant`].
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
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Deterministic clock that advances by a fixed `step` on every reading.
///
/// The first reading returns the start time. A zero step never advances,
/// which leaves termination to the solver's early break.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
    step_nanos: u64,
}

impl ManualClock {
    pub fn new(step: Duration) -> Self {
        Self {
            nanos: AtomicU64::new(0),
            step_nanos: duration_nanos(step),
        }
    }

    /// Move the clock forward without taking a reading.
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(duration_nanos(by), Ordering::SeqCst);
    }

    /// Current time without advancing.
    pub fn peek(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.fetch_add(self.step_nanos, Ordering::SeqCst))
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
