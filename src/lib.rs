//! In-process event tracing with Chrome Trace Event Format output
//!
//! Instrumentation sites scattered through a program record duration spans,
//! instants, counters and async phases into a bounded in-memory buffer with
//! minimal hot-path overhead. Flushing serializes the buffered events as
//! Chrome-Trace-Event-Format JSON and hands the chunks to a user-supplied
//! sink; the resulting file loads directly into `chrome://tracing` or
//! Perfetto.
//!
//! Categories gate recording: every site is tagged with a category name, and
//! a comma-separated regex filter (`"render, -gpu.*"`) enables or disables
//! categories process-wide, including sites already resolved.
//!
//! # Examples
//! ```
//! use chrometrace::{trace_instant, trace_scope, TraceLog};
//!
//! let log = TraceLog::global();
//! log.set_output_callback(|json| print!("{json}"));
//! log.begin_logging();
//!
//! {
//!     trace_scope!("demo", "main-loop");
//!     trace_instant!("demo", "tick", "frame" => 1u64);
//! }
//!
//! log.flush();
//! log.end_logging();
//! ```
//!
//! Durations below an interesting threshold can be dropped wholesale:
//! `trace_scope_if_longer_than!(42_000, "io", "read")` erases the begin/end
//! pair when the scope finishes in under 42µs.

pub mod category;
pub mod dispatch;
pub mod errors;
pub mod event;
pub mod flush_monitor;
pub mod process;
pub mod scope;
pub mod sink;
pub mod string_ref;
pub mod test_utils;
pub mod time;
pub mod trace_id;
pub mod value;

mod macros;

pub use crate::dispatch::{CopyStr, TraceLog};
pub use crate::event::{EventFlags, Phase};

pub mod prelude {
    pub use crate::category::{self, CategoryFilter, CategoryProxy};
    pub use crate::dispatch::{add_event, add_event_with_arg, CopyStr, TraceLog};
    pub use crate::event::{EventFlags, Phase};
    pub use crate::scope::{ScopeSpan, ThresholdScopeSpan};
    pub use crate::sink::{start_file_tracing, FileSink};
    pub use crate::trace_id::TraceId;
    pub use crate::value::TraceValue;
    pub use crate::{
        trace_async_begin, trace_async_end, trace_async_step, trace_begin, trace_counter,
        trace_counter_id, trace_end, trace_instant, trace_scope, trace_scope_if_longer_than,
    };
}
