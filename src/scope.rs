//! Scoped spans: drop guards that emit the END half of a duration pair
//!
//! The instrumentation site records the BEGIN event itself (when the category
//! proxy is enabled) and lets the guard close the span on scope exit. A guard
//! is tied to one lexical region; do not move it out of the scope it times.
use std::cell::Cell;

use crate::category::CategoryProxy;
use crate::dispatch::TraceLog;
use crate::event::{no_args, EventFlags, Phase};
use crate::string_ref::StringRef;
use crate::trace_id::TraceId;

/// Emits an END event for `category/event_name` when dropped.
pub struct ScopeSpan<'a> {
    log: &'a TraceLog,
    proxy: CategoryProxy,
    event_name: &'static str,
}

impl<'a> ScopeSpan<'a> {
    pub fn new(log: &'a TraceLog, proxy: CategoryProxy, event_name: &'static str) -> Self {
        Self {
            log,
            proxy,
            event_name,
        }
    }
}

impl Drop for ScopeSpan<'_> {
    fn drop(&mut self) {
        emit_scope_end(
            self.log,
            self.proxy,
            self.event_name,
            TraceLog::EVENT_ID_NONE,
            0,
        );
    }
}

/// Like [`ScopeSpan`], but the begin/end pair is erased from the buffer when
/// the scope lasted less than `threshold_ns`.
///
/// The site stores the id returned by its BEGIN recording via
/// [`set_threshold_begin_id`](Self::set_threshold_begin_id); without it the
/// END is recorded unconditionally.
pub struct ThresholdScopeSpan<'a> {
    log: &'a TraceLog,
    proxy: CategoryProxy,
    event_name: &'static str,
    threshold_begin_id: Cell<i32>,
    threshold_ns: i64,
}

impl<'a> ThresholdScopeSpan<'a> {
    pub fn new(
        log: &'a TraceLog,
        proxy: CategoryProxy,
        event_name: &'static str,
        threshold_ns: i64,
    ) -> Self {
        Self {
            log,
            proxy,
            event_name,
            threshold_begin_id: Cell::new(TraceLog::EVENT_ID_NONE),
            threshold_ns,
        }
    }

    pub fn set_threshold_begin_id(&self, event_id: i32) {
        self.threshold_begin_id.set(event_id);
    }
}

impl Drop for ThresholdScopeSpan<'_> {
    fn drop(&mut self) {
        emit_scope_end(
            self.log,
            self.proxy,
            self.event_name,
            self.threshold_begin_id.get(),
            self.threshold_ns,
        );
    }
}

// Runs inside Drop: failures go to the diagnostics channel, never unwind.
fn emit_scope_end(
    log: &TraceLog,
    proxy: CategoryProxy,
    event_name: &'static str,
    threshold_begin_id: i32,
    threshold_ns: i64,
) {
    if !proxy.enabled() {
        return;
    }
    let result = log.record_raw(
        Phase::End,
        StringRef::from(proxy.name()),
        StringRef::from(event_name),
        TraceId::NONE,
        EventFlags::empty(),
        threshold_begin_id,
        threshold_ns,
        None,
        no_args(),
    );
    if let Err(err) = result {
        log::error!("scope end '{}/{event_name}' dropped: {err}", proxy.name());
    }
}
