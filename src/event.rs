//! The trace event record and its JSON serialization
use std::fmt::Write as _;

use crate::process::{ProcessId, ThreadId};
use crate::string_ref::StringRef;
use crate::value::TraceValue;

/// Hard cap on `(name, value)` argument pairs per event. Slots beyond the
/// recorded arguments hold the null sentinel.
pub const MAX_ARGS: usize = 4;

/// The bounded argument array stored inline in every event.
pub type ArgSlots = [(StringRef, TraceValue); MAX_ARGS];

/// Argument array with every slot empty.
pub fn no_args() -> ArgSlots {
    [(StringRef::null(), TraceValue::None); MAX_ARGS]
}

/// Phase indicates the nature of an event entry, e.g. part of a begin/end
/// pair. The codes are the single characters the Chrome trace viewer expects
/// in the `ph` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Duration event begin.
    Begin,
    /// Duration event end.
    End,
    /// Complete event with duration.
    Complete,
    /// Instant event.
    Instant,
    AsyncBegin,
    AsyncStep,
    AsyncEnd,
    /// Metadata event.
    Metadata,
    /// Counter event.
    Counter,
}

impl Phase {
    pub fn code(self) -> char {
        match self {
            Phase::Begin => 'B',
            Phase::End => 'E',
            Phase::Complete => 'X',
            Phase::Instant => 'I',
            Phase::AsyncBegin => 'S',
            Phase::AsyncStep => 'T',
            Phase::AsyncEnd => 'F',
            Phase::Metadata => 'M',
            Phase::Counter => 'C',
        }
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventFlags: u8 {
        /// Emit the `id` field; the trace id is meaningful.
        const HAS_ID = 1 << 0;
        /// XOR the trace id with the process id hash at recording time.
        const MANGLE_ID = 1 << 1;
    }
}

/// Immutable record of a single trace point.
///
/// All string fields are [`StringRef`] views; any of them marked for deep
/// copy at ingestion point into `copy_storage`, which moves with the event.
#[derive(Debug)]
pub struct TraceEvent {
    args: ArgSlots,
    category_name: StringRef,
    event_name: StringRef,
    thread_id: ThreadId,
    timestamp: i64,
    trace_id: u64,
    copy_storage: Option<Box<[u8]>>,
    phase: Phase,
    flags: EventFlags,
}

impl TraceEvent {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        thread_id: ThreadId,
        timestamp: i64,
        phase: Phase,
        category_name: StringRef,
        event_name: StringRef,
        trace_id: u64,
        flags: EventFlags,
        copy_storage: Option<Box<[u8]>>,
        args: ArgSlots,
    ) -> Self {
        debug_assert!(!category_name.is_null(), "category_name must be present");
        debug_assert!(!event_name.is_null(), "event_name must be present");
        Self {
            args,
            category_name,
            event_name,
            thread_id,
            timestamp,
            trace_id,
            copy_storage,
            phase,
            flags,
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn flags(&self) -> EventFlags {
        self.flags
    }

    pub fn trace_id(&self) -> u64 {
        self.trace_id
    }

    pub fn category_name(&self) -> &str {
        self.category_name.as_str().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.event_name.as_str().unwrap_or_default()
    }

    pub fn has_copy_storage(&self) -> bool {
        self.copy_storage.is_some()
    }

    /// Appends one JSON object followed by a comma and newline:
    ///
    /// ```text
    /// {"cat":"c","pid":1,"tid":2,"ph":"B","ts":0,"name":"e","args":{...},"id":"0x..."},
    /// ```
    ///
    /// `args` is present iff at least one slot is filled and stops at the
    /// first empty slot; `id` is present iff `HAS_ID` is set.
    pub fn append_json(&self, process_id: ProcessId, out: &mut String) {
        let _ = write!(
            out,
            r#"{{"cat":"{}","pid":{},"tid":{},"ph":"{}","ts":{},"name":"{}""#,
            JsonEscaped(self.category_name()),
            process_id,
            self.thread_id,
            self.phase.code(),
            self.timestamp,
            JsonEscaped(self.name()),
        );

        if !self.args[0].0.is_null() {
            out.push_str(",\"args\":{");
            let mut comma = "";
            for (arg_name, arg_value) in &self.args {
                let Some(key) = arg_name.as_str() else {
                    break;
                };
                let _ = write!(out, "{}\"{}\":", comma, JsonEscaped(key));
                append_value_json(arg_value, out);
                comma = ",";
            }
            out.push('}');
        }

        if self.flags.contains(EventFlags::HAS_ID) {
            let _ = write!(out, r#","id":"0x{:08X}""#, self.trace_id);
        }

        out.push_str("},\n");
    }
}

// The StringRef fields point at static storage or at this event's own
// copy_storage, both immutable for the event's lifetime.
unsafe impl Send for TraceEvent {}
unsafe impl Sync for TraceEvent {}

fn append_value_json(value: &TraceValue, out: &mut String) {
    match value {
        TraceValue::None => out.push_str("null"),
        TraceValue::Bool(v) => out.push_str(if *v { "true" } else { "false" }),
        TraceValue::U64(v) => {
            let _ = write!(out, "{v}");
        }
        TraceValue::I64(v) => {
            let _ = write!(out, "{v}");
        }
        TraceValue::F64(v) => {
            // JSON has no NaN/Infinity literals
            if v.is_finite() {
                let _ = write!(out, "{v}");
            } else {
                out.push_str("null");
            }
        }
        TraceValue::Str(sref) => match sref.as_str() {
            Some(s) => {
                let _ = write!(out, "\"{}\"", JsonEscaped(s));
            }
            None => out.push_str("null"),
        },
        TraceValue::Ptr(p) => {
            // JSON numbers only cover doubles and 64-bit integers, so
            // addresses go out as hex strings.
            if p.is_null() {
                out.push_str("null");
            } else {
                let _ = write!(out, "\"0x{:x}\"", *p as usize);
            }
        }
    }
}

/// JSON string escaping per RFC 7159: short escapes for the usual suspects,
/// `\uXXXX` for remaining control characters, forward slash left alone.
struct JsonEscaped<'a>(&'a str);

impl std::fmt::Display for JsonEscaped<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for chr in self.0.chars() {
            match chr {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\u{8}' => f.write_str("\\b")?,
                '\u{c}' => f.write_str("\\f")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                '\t' => f.write_str("\\t")?,
                c if (c as u32) < 0x20 => write!(f, "\\u{:04X}", c as u32)?,
                c => f.write_char(c)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_with_args(args: ArgSlots) -> TraceEvent {
        TraceEvent::new(
            2,
            100,
            Phase::Begin,
            StringRef::from("cat"),
            StringRef::from("evt"),
            0,
            EventFlags::empty(),
            None,
            args,
        )
    }

    fn render(event: &TraceEvent) -> String {
        let mut out = String::new();
        event.append_json(1, &mut out);
        out
    }

    #[test]
    fn test_json_shape_without_args() {
        let json = render(&event_with_args(no_args()));
        assert_eq!(
            json,
            "{\"cat\":\"cat\",\"pid\":1,\"tid\":2,\"ph\":\"B\",\"ts\":100,\"name\":\"evt\"},\n"
        );
    }

    #[test]
    fn test_json_args_stop_at_first_empty_slot() {
        let mut args = no_args();
        args[0] = (StringRef::from("k1"), TraceValue::from(1u64));
        args[2] = (StringRef::from("k3"), TraceValue::from(3u64));
        let json = render(&event_with_args(args));
        assert!(json.contains("\"args\":{\"k1\":1}"));
        assert!(!json.contains("k3"));
    }

    #[test]
    fn test_json_value_cases() {
        let mut args = no_args();
        args[0] = (StringRef::from("b"), TraceValue::from(true));
        args[1] = (StringRef::from("i"), TraceValue::from(-3));
        args[2] = (StringRef::from("f"), TraceValue::from(2.5));
        args[3] = (StringRef::from("s"), TraceValue::from("x/y"));
        let json = render(&event_with_args(args));
        assert!(json.contains("\"args\":{\"b\":true,\"i\":-3,\"f\":2.5,\"s\":\"x/y\"}"));
    }

    #[test]
    fn test_json_nonfinite_double_is_null() {
        let mut args = no_args();
        args[0] = (StringRef::from("f"), TraceValue::from(f64::NAN));
        assert!(render(&event_with_args(args)).contains("\"f\":null"));
    }

    #[test]
    fn test_json_pointer_value() {
        let mut args = no_args();
        args[0] = (StringRef::from("p"), TraceValue::Ptr(0x1f2e as *const ()));
        args[1] = (
            StringRef::from("null_p"),
            TraceValue::Ptr(std::ptr::null()),
        );
        let json = render(&event_with_args(args));
        assert!(json.contains("\"p\":\"0x1f2e\""));
        assert!(json.contains("\"null_p\":null"));
    }

    #[test]
    fn test_json_id_field() {
        let event = TraceEvent::new(
            2,
            0,
            Phase::Begin,
            StringRef::from("c"),
            StringRef::from("e"),
            16,
            EventFlags::HAS_ID,
            None,
            no_args(),
        );
        assert!(render(&event).contains("\"id\":\"0x00000010\""));
    }

    #[test]
    fn test_json_id_wider_than_eight_hex_digits() {
        let event = TraceEvent::new(
            2,
            0,
            Phase::Begin,
            StringRef::from("c"),
            StringRef::from("e"),
            0x1234_5678_9ABC,
            EventFlags::HAS_ID,
            None,
            no_args(),
        );
        assert!(render(&event).contains("\"id\":\"0x123456789ABC\""));
    }

    #[test]
    fn test_escaping() {
        let mut out = String::new();
        let _ = std::fmt::write(
            &mut out,
            format_args!("{}", JsonEscaped("a\"b\\c\nd\te\u{1}f/g")),
        );
        assert_eq!(out, "a\\\"b\\\\c\\nd\\te\\u0001f/g");
    }

    #[test]
    fn test_phase_codes() {
        let codes: String = [
            Phase::Begin,
            Phase::End,
            Phase::Complete,
            Phase::Instant,
            Phase::AsyncBegin,
            Phase::AsyncStep,
            Phase::AsyncEnd,
            Phase::Metadata,
            Phase::Counter,
        ]
        .into_iter()
        .map(Phase::code)
        .collect();
        assert_eq!(codes, "BEXISTFMC");
    }
}
