//! Shared fixtures for tests: a capturing sink and a deterministic clock
//!
//! Tests that go through the process-wide log or the category registry share
//! global state and must be marked `#[serial]`; tests driving their own
//! `TraceLog` handle can run in parallel.
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crate::dispatch::TraceLog;
use crate::time::ClockSource;

/// Output callback that accumulates every chunk for inspection.
pub struct CaptureSink {
    chunks: Mutex<Vec<String>>,
}

impl CaptureSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            chunks: Mutex::new(Vec::new()),
        })
    }

    /// Installs this sink as `log`'s output callback.
    pub fn install(self: &Arc<Self>, log: &TraceLog) {
        let sink = Arc::clone(self);
        log.set_output_callback(move |chunk| sink.push(chunk));
    }

    fn push(&self, chunk: &str) {
        self.chunks.lock().unwrap().push(chunk.to_owned());
    }

    pub fn chunks(&self) -> Vec<String> {
        self.chunks.lock().unwrap().clone()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().unwrap().len()
    }

    /// Everything received so far, concatenated into one document.
    pub fn concatenated(&self) -> String {
        self.chunks.lock().unwrap().concat()
    }

    pub fn clear(&self) {
        self.chunks.lock().unwrap().clear();
    }
}

/// Deterministic clock: every read returns the current count and advances it
/// by a fixed resolution, so back-to-back events get distinct, predictable
/// timestamps.
pub struct ManualClock {
    count_ns: AtomicI64,
    resolution_ns: i64,
}

impl ManualClock {
    /// 10 ns per read, starting at zero.
    pub fn new() -> Self {
        Self::with_resolution(0, 10)
    }

    pub fn with_resolution(start_ns: i64, resolution_ns: i64) -> Self {
        Self {
            count_ns: AtomicI64::new(start_ns),
            resolution_ns,
        }
    }

    pub fn resolution_ns(&self) -> i64 {
        self.resolution_ns
    }

    /// Moves the clock forward, e.g. to simulate time spent inside a scope.
    pub fn advance(&self, delta_ns: i64) {
        self.count_ns.fetch_add(delta_ns, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> i64 {
        self.count_ns.fetch_add(self.resolution_ns, Ordering::SeqCst)
    }
}

/// A log on a manual clock with a capturing sink already installed.
pub fn manual_log() -> (TraceLog, Arc<ManualClock>, Arc<CaptureSink>) {
    let clock = Arc::new(ManualClock::new());
    let log = TraceLog::with_clock(clock.clone());
    let sink = CaptureSink::new();
    sink.install(&log);
    (log, clock, sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances_per_read() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), 0);
        assert_eq!(clock.now(), 10);
        clock.advance(42_000);
        assert_eq!(clock.now(), 42_020);
    }
}
