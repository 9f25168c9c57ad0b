//! Monotonic tick count used to timestamp events
use std::time::Instant;

/// Monotonic timestamp provider. The trace log reads timestamps through a
/// trait object so tests can substitute a deterministic source.
pub trait ClockSource: Send + Sync {
    /// Nanoseconds since the clock epoch.
    fn now(&self) -> i64;
}

/// Default clock. The epoch is the construction instant, so timestamps of a
/// freshly created log start near zero.
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for MonotonicClock {
    #[allow(clippy::cast_possible_wrap)]
    fn now(&self) -> i64 {
        // wraps after ~292 years of process uptime
        self.epoch.elapsed().as_nanos() as i64
    }
}

lazy_static::lazy_static! {
    static ref PROCESS_CLOCK: MonotonicClock = MonotonicClock::new();
}

/// Nanoseconds since the process-wide clock epoch.
pub fn now() -> i64 {
    PROCESS_CLOCK.now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic() {
        let t1 = now();
        let t2 = now();
        assert!(t2 >= t1);
    }

    #[test]
    fn test_fresh_clock_starts_near_zero() {
        let clock = MonotonicClock::new();
        assert!(clock.now() < 1_000_000_000);
    }
}
