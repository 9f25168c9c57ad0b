//! Where events are recorded, buffered and eventually flushed to the sink
//!
//! The [`TraceLog`] owns the bounded in-memory event buffer. Insertion takes
//! a single mutex; flushing swaps the buffer out under the lock and formats
//! JSON outside it, so recording is never blocked by sink latency. A
//! process-wide instance backs the instrumentation macros; tests construct
//! their own log with a deterministic clock instead.
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

pub use crate::errors::{Error, Result};
use crate::event::{no_args, ArgSlots, EventFlags, Phase, TraceEvent, MAX_ARGS};
use crate::process::{current_process_id, current_thread_id, process_id_hash, ProcessId, ThreadId};
use crate::sink::{null_output, OutputCallback};
use crate::string_ref::StringRef;
use crate::time::{ClockSource, MonotonicClock};
use crate::value::TraceValue;

/// Marks a string argument for deep copy into the event's owned storage.
///
/// Plain `&'static str` arguments promise program-lifetime storage and are
/// recorded as borrowed views. Wrapping a string in `CopyStr` directs the log
/// to copy the bytes instead, so the caller's buffer may be mutated or freed
/// as soon as the recording call returns.
#[derive(Debug, Clone, Copy)]
pub struct CopyStr<'a>(pub &'a str);

/// An event-name or argument-key input: either a static borrow or a string
/// to deep-copy.
#[derive(Debug, Clone, Copy)]
pub enum EventStr<'a> {
    Static(&'static str),
    Copy(&'a str),
}

impl EventStr<'_> {
    fn alloc_size(&self) -> usize {
        match self {
            EventStr::Static(_) => 0,
            EventStr::Copy(s) => s.len() + 1,
        }
    }

    fn bind(&self, storage: &mut CopyStorage) -> StringRef {
        match self {
            EventStr::Static(s) => StringRef::from(*s),
            EventStr::Copy(s) => storage.bind(s),
        }
    }
}

impl<'a> From<&'static str> for EventStr<'a> {
    fn from(s: &'static str) -> Self {
        EventStr::Static(s)
    }
}

impl<'a> From<CopyStr<'a>> for EventStr<'a> {
    fn from(s: CopyStr<'a>) -> Self {
        EventStr::Copy(s.0)
    }
}

/// An argument-value input: any [`TraceValue`] conversion, or a string to
/// deep-copy.
#[derive(Debug, Clone, Copy)]
pub enum ArgValue<'a> {
    Value(TraceValue),
    Copy(&'a str),
}

impl ArgValue<'_> {
    fn alloc_size(&self) -> usize {
        match self {
            ArgValue::Value(_) => 0,
            ArgValue::Copy(s) => s.len() + 1,
        }
    }

    fn bind(&self, storage: &mut CopyStorage) -> TraceValue {
        match self {
            ArgValue::Value(v) => *v,
            ArgValue::Copy(s) => TraceValue::Str(storage.bind(s)),
        }
    }
}

impl<'a> From<CopyStr<'a>> for ArgValue<'a> {
    fn from(s: CopyStr<'a>) -> Self {
        ArgValue::Copy(s.0)
    }
}

impl<'a> From<TraceValue> for ArgValue<'a> {
    fn from(v: TraceValue) -> Self {
        ArgValue::Value(v)
    }
}

macro_rules! impl_arg_value_from {
    ($($t:ty),*) => {
        $(impl<'a> From<$t> for ArgValue<'a> {
            fn from(v: $t) -> Self {
                ArgValue::Value(TraceValue::from(v))
            }
        })*
    };
}

impl_arg_value_from!(
    bool,
    u8,
    u16,
    u32,
    u64,
    usize,
    i8,
    i16,
    i32,
    i64,
    isize,
    f32,
    f64,
    &'static str
);

/// Single allocation holding every deep-copied string of one event. Each
/// string is stored NUL-terminated; the returned views exclude the
/// terminator.
struct CopyStorage {
    buf: Option<Box<[u8]>>,
    offset: usize,
}

impl CopyStorage {
    fn with_capacity(alloc_size: usize) -> Self {
        let buf = (alloc_size > 0).then(|| vec![0u8; alloc_size].into_boxed_slice());
        Self { buf, offset: 0 }
    }

    fn bind(&mut self, s: &str) -> StringRef {
        let buf = self
            .buf
            .as_mut()
            .expect("copy storage sized for every marked string");
        let end = self.offset + s.len();
        buf[self.offset..end].copy_from_slice(s.as_bytes());
        buf[end] = 0;
        let sref = StringRef::from_bytes(&buf[self.offset..end]);
        self.offset = end + 1;
        sref
    }

    // The views handed out by bind() stay valid: moving the box moves only
    // the pointer, not the heap bytes.
    fn into_storage(self) -> Option<Box<[u8]>> {
        self.buf
    }
}

struct LogState {
    events: Vec<TraceEvent>,
    thread_ids_seen: Vec<ThreadId>,
}

/// Bounded, thread-safe log of trace events with batched JSON flushing.
pub struct TraceLog {
    state: Mutex<LogState>,
    // mirrors events.len() so the hot path can reject on a full buffer and
    // queries can run without taking the lock; stale reads are fine
    event_count: AtomicUsize,
    enabled: AtomicBool,
    process_id: AtomicU32,
    process_id_hash: AtomicU64,
    output: RwLock<OutputCallback>,
    clock: Arc<dyn ClockSource>,
}

impl TraceLog {
    /// Hard cap on buffered events; recording past it drops events.
    pub const BUFFER_SZ: usize = 500_000;

    /// Events serialized per output callback invocation.
    pub const BATCH_SZ: usize = 1000;

    /// Returned by the recording paths when no event was stored.
    pub const EVENT_ID_NONE: i32 = -1;

    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::new()))
    }

    /// A log reading timestamps from `clock`; the seam tests use to make
    /// threshold arithmetic deterministic.
    pub fn with_clock(clock: Arc<dyn ClockSource>) -> Self {
        let process_id = current_process_id();
        Self {
            state: Mutex::new(LogState {
                events: Vec::new(),
                thread_ids_seen: Vec::new(),
            }),
            event_count: AtomicUsize::new(0),
            enabled: AtomicBool::new(false),
            process_id: AtomicU32::new(process_id),
            process_id_hash: AtomicU64::new(process_id_hash(process_id)),
            output: RwLock::new(null_output()),
            clock,
        }
    }

    /// The process-wide instance used by the instrumentation macros.
    pub fn global() -> &'static TraceLog {
        lazy_static::lazy_static! {
            static ref GLOBAL_LOG: TraceLog = TraceLog::new();
        }
        &GLOBAL_LOG
    }

    /// Installs the sink. The callback may be invoked from any thread and
    /// must not call back into the log.
    pub fn set_output_callback(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        *self.output.write().unwrap() = Arc::new(callback);
    }

    fn output(&self) -> OutputCallback {
        // a writer mid-swap falls back to discarding, same as an unset sink
        match self.output.try_read() {
            Ok(guard) => guard.clone(),
            Err(_) => null_output(),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        if enabled {
            self.enabled.store(true, Ordering::Relaxed);
            return;
        }
        if self.enabled.swap(false, Ordering::Relaxed) {
            self.flush();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Overrides the captured process id and rehashes the mangling key.
    pub fn set_process_id(&self, process_id: ProcessId) {
        self.process_id.store(process_id, Ordering::Relaxed);
        self.process_id_hash
            .store(process_id_hash(process_id), Ordering::Relaxed);
    }

    pub fn process_id(&self) -> ProcessId {
        self.process_id.load(Ordering::Relaxed)
    }

    /// Number of buffered events; advisory, may be stale under concurrency.
    pub fn event_count(&self) -> usize {
        self.event_count.load(Ordering::Relaxed)
    }

    /// Fraction of the buffer in use, in `0.0..=1.0`; advisory.
    pub fn buffer_fill_fraction(&self) -> f32 {
        self.event_count() as f32 / Self::BUFFER_SZ as f32
    }

    /// Emits the JSON document prelude and enables the log.
    pub fn begin_logging(&self) {
        self.enabled.store(true, Ordering::Relaxed);
        let output = self.output();
        output("{\"traceEvents\":[\n");
    }

    /// Emits the JSON document epilogue.
    pub fn end_logging(&self) {
        let output = self.output();
        output("],\"displayTimeUnit\":\"ns\"}\n");
    }

    /// Records an event without arguments. Returns the event id, or
    /// [`Self::EVENT_ID_NONE`] when the event was not stored (buffer full,
    /// threshold discard, or an internal failure reported to diagnostics).
    #[allow(clippy::too_many_arguments)]
    pub fn add_event<'a>(
        &self,
        phase: Phase,
        category_name: &'static str,
        event_name: impl Into<EventStr<'a>>,
        trace_id: u64,
        flags: EventFlags,
        threshold_begin_id: i32,
        threshold_ns: i64,
    ) -> i32 {
        let event_name = event_name.into();
        let mut storage = CopyStorage::with_capacity(event_name.alloc_size());
        let name_ref = event_name.bind(&mut storage);
        self.report_record_failure(self.record_raw(
            phase,
            StringRef::from(category_name),
            name_ref,
            trace_id,
            flags,
            threshold_begin_id,
            threshold_ns,
            storage.into_storage(),
            no_args(),
        ))
    }

    /// Records an event with one `(name, value)` argument pair.
    #[allow(clippy::too_many_arguments)]
    pub fn add_event_with_arg<'a>(
        &self,
        phase: Phase,
        category_name: &'static str,
        event_name: impl Into<EventStr<'a>>,
        trace_id: u64,
        flags: EventFlags,
        threshold_begin_id: i32,
        threshold_ns: i64,
        arg_name: impl Into<EventStr<'a>>,
        arg_value: impl Into<ArgValue<'a>>,
    ) -> i32 {
        let event_name = event_name.into();
        let arg_name = arg_name.into();
        let arg_value = arg_value.into();

        let alloc_size =
            event_name.alloc_size() + arg_name.alloc_size() + arg_value.alloc_size();
        let mut storage = CopyStorage::with_capacity(alloc_size);
        let name_ref = event_name.bind(&mut storage);
        let mut args = no_args();
        args[0] = (arg_name.bind(&mut storage), arg_value.bind(&mut storage));

        self.report_record_failure(self.record_raw(
            phase,
            StringRef::from(category_name),
            name_ref,
            trace_id,
            flags,
            threshold_begin_id,
            threshold_ns,
            storage.into_storage(),
            args,
        ))
    }

    /// Records an event with up to [`MAX_ARGS`] argument pairs.
    #[allow(clippy::too_many_arguments)]
    pub fn add_event_with_args<'a>(
        &self,
        phase: Phase,
        category_name: &'static str,
        event_name: impl Into<EventStr<'a>>,
        trace_id: u64,
        flags: EventFlags,
        threshold_begin_id: i32,
        threshold_ns: i64,
        arg_pairs: &[(EventStr<'a>, ArgValue<'a>)],
    ) -> i32 {
        assert!(
            arg_pairs.len() <= MAX_ARGS,
            "an event holds at most {MAX_ARGS} arguments"
        );

        let event_name = event_name.into();
        let mut alloc_size = event_name.alloc_size();
        for (arg_name, arg_value) in arg_pairs {
            alloc_size += arg_name.alloc_size() + arg_value.alloc_size();
        }
        let mut storage = CopyStorage::with_capacity(alloc_size);
        let name_ref = event_name.bind(&mut storage);
        let mut args = no_args();
        for (slot, (arg_name, arg_value)) in args.iter_mut().zip(arg_pairs) {
            *slot = (arg_name.bind(&mut storage), arg_value.bind(&mut storage));
        }

        self.report_record_failure(self.record_raw(
            phase,
            StringRef::from(category_name),
            name_ref,
            trace_id,
            flags,
            threshold_begin_id,
            threshold_ns,
            storage.into_storage(),
            args,
        ))
    }

    fn report_record_failure(&self, result: Result<i32>) -> i32 {
        match result {
            Ok(event_id) => event_id,
            Err(err) => {
                log::error!("trace event dropped: {err}");
                Self::EVENT_ID_NONE
            }
        }
    }

    /// Thread-safe insertion path. All string views must satisfy the event
    /// storage invariant: static, or into `storage`.
    ///
    /// With a `threshold_begin_id`, the caller asserts `phase == End`; the
    /// pair is dropped when the elapsed time since the matching BEGIN is
    /// below `threshold_ns`, erasing the BEGIN from the buffer.
    #[allow(clippy::too_many_arguments)]
    pub fn record_raw(
        &self,
        phase: Phase,
        category_name: StringRef,
        event_name: StringRef,
        trace_id: u64,
        flags: EventFlags,
        threshold_begin_id: i32,
        threshold_ns: i64,
        storage: Option<Box<[u8]>>,
        args: ArgSlots,
    ) -> Result<i32> {
        if self.event_count.load(Ordering::Relaxed) >= Self::BUFFER_SZ {
            return Ok(Self::EVENT_ID_NONE);
        }

        let mut state = self.state.lock().map_err(|_| Error::LockPoisoned)?;

        let thread_id = current_thread_id();
        // capture inside the lock, before threshold resolution, so buffer
        // order and threshold arithmetic see the same instant
        let timestamp = self.clock.now();

        if !state.thread_ids_seen.contains(&thread_id) {
            state.thread_ids_seen.push(thread_id);
        }

        if threshold_begin_id > Self::EVENT_ID_NONE {
            debug_assert_eq!(phase, Phase::End, "only END events resolve a threshold");
            let begin_id = threshold_begin_id as usize;

            // the BEGIN may have been flushed already; then the END is
            // unreachable and gets discarded too
            if begin_id >= state.events.len() {
                return Ok(Self::EVENT_ID_NONE);
            }

            let elapsed = timestamp - state.events[begin_id].timestamp();
            if elapsed < threshold_ns {
                // drop the pair: erase the BEGIN, don't record the END.
                // Shifts every later event id down by one, so thresholded
                // scopes must not overlap.
                state.events.remove(begin_id);
                self.event_count.store(state.events.len(), Ordering::Relaxed);
                return Ok(Self::EVENT_ID_NONE);
            }
        }

        let mut trace_id = trace_id;
        if flags.contains(EventFlags::MANGLE_ID) {
            trace_id ^= self.process_id_hash.load(Ordering::Relaxed);
        }

        let event_id = state.events.len() as i32;
        state.events.push(TraceEvent::new(
            thread_id,
            timestamp,
            phase,
            category_name,
            event_name,
            trace_id,
            flags,
            storage,
            args,
        ));
        self.event_count.store(state.events.len(), Ordering::Relaxed);

        Ok(event_id)
    }

    /// Swaps the live buffer out under the lock, then formats the drained
    /// events in batches of [`Self::BATCH_SZ`] and hands each JSON chunk to
    /// the output callback. Recording resumes immediately on the fresh
    /// buffer.
    pub fn flush(&self) {
        let drained = {
            let Ok(mut state) = self.state.lock() else {
                log::error!("trace buffer lock poisoned, flush skipped");
                return;
            };
            self.event_count.store(0, Ordering::Relaxed);
            std::mem::take(&mut state.events)
        };
        if drained.is_empty() {
            return;
        }

        let output = self.output();
        let process_id = self.process_id();
        let mut json = String::with_capacity(4096);
        for batch in drained.chunks(Self::BATCH_SZ) {
            json.clear();
            for event in batch {
                event.append_json(process_id, &mut json);
            }
            output(&json);
        }
    }

    /// Appends one METADATA event per thread seen so far, labelling it
    /// `thread-<tid>`; the label is deep-copied into the event.
    pub fn add_thread_name_metadata_events(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let thread_ids = state.thread_ids_seen.clone();
        for thread_id in thread_ids {
            let label = format!("thread-{thread_id}");
            let mut storage = CopyStorage::with_capacity(label.len() + 1);
            let label_ref = storage.bind(&label);
            let mut args = no_args();
            args[0] = (StringRef::from("name"), TraceValue::Str(label_ref));
            state.events.push(TraceEvent::new(
                thread_id,
                self.clock.now(),
                Phase::Metadata,
                StringRef::from("__metadata"),
                StringRef::from("thread_name"),
                0,
                EventFlags::empty(),
                storage.into_storage(),
                args,
            ));
        }
        self.event_count.store(state.events.len(), Ordering::Relaxed);
    }
}

impl Default for TraceLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Records an event through the process-wide log, without threshold
/// tracking.
pub fn add_event<'a>(
    phase: Phase,
    category_name: &'static str,
    event_name: impl Into<EventStr<'a>>,
    trace_id: u64,
    flags: EventFlags,
) -> i32 {
    TraceLog::global().add_event(
        phase,
        category_name,
        event_name,
        trace_id,
        flags,
        TraceLog::EVENT_ID_NONE,
        0,
    )
}

/// Records a one-argument event through the process-wide log.
pub fn add_event_with_arg<'a>(
    phase: Phase,
    category_name: &'static str,
    event_name: impl Into<EventStr<'a>>,
    trace_id: u64,
    flags: EventFlags,
    arg_name: impl Into<EventStr<'a>>,
    arg_value: impl Into<ArgValue<'a>>,
) -> i32 {
    TraceLog::global().add_event_with_arg(
        phase,
        category_name,
        event_name,
        trace_id,
        flags,
        TraceLog::EVENT_ID_NONE,
        0,
        arg_name,
        arg_value,
    )
}
