//! FlushMonitor triggers the flush of the trace buffer at regular interval.
use chrono::prelude::*;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::dispatch::TraceLog;

/// Buffer fill fraction past which a tick flushes regardless of the period.
const FILL_WATERMARK: f32 = 0.75;

pub struct FlushMonitor {
    last_flush: AtomicI64,
    flush_period_seconds: i64,
}

impl FlushMonitor {
    pub fn new(flush_period_seconds: i64) -> Self {
        Self {
            last_flush: AtomicI64::new(Local::now().timestamp()),
            flush_period_seconds,
        }
    }

    pub fn time_to_flush_seconds(&self) -> i64 {
        let now = Local::now().timestamp();
        let seconds_since_flush = now - self.last_flush.load(Ordering::Relaxed);
        self.flush_period_seconds - seconds_since_flush
    }

    /// Call periodically from any convenient loop; flushes `log` when the
    /// period elapsed or the buffer is close to dropping events.
    pub fn tick(&self, log: &TraceLog) {
        if self.time_to_flush_seconds() <= 0 || log.buffer_fill_fraction() >= FILL_WATERMARK {
            self.last_flush
                .store(Local::now().timestamp(), Ordering::Relaxed);
            log.flush();
        }
    }
}

impl Default for FlushMonitor {
    fn default() -> Self {
        // Default is to flush every minute unless specified by the env variable
        const DEFAULT_PERIOD: i64 = 60;
        let nb_seconds = std::env::var("CHROMETRACE_FLUSH_PERIOD")
            .map(|v| v.parse::<i64>().unwrap_or(DEFAULT_PERIOD))
            .unwrap_or(DEFAULT_PERIOD);
        Self::new(nb_seconds)
    }
}
