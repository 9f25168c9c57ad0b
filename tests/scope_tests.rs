use chrometrace::category::CategoryRegistry;
use chrometrace::dispatch::TraceLog;
use chrometrace::event::{EventFlags, Phase};
use chrometrace::scope::{ScopeSpan, ThresholdScopeSpan};
use chrometrace::test_utils::{manual_log, CaptureSink};

fn event_lines(sink: &CaptureSink) -> Vec<String> {
    sink.concatenated()
        .lines()
        .filter(|line| line.contains("\"cat\""))
        .map(str::to_owned)
        .collect()
}

fn record_begin(log: &TraceLog, category: &'static str, name: &'static str) -> i32 {
    log.add_event(
        Phase::Begin,
        category,
        name,
        0,
        EventFlags::empty(),
        TraceLog::EVENT_ID_NONE,
        0,
    )
}

#[test]
fn test_scope_emits_end_on_drop() {
    let (log, _clock, sink) = manual_log();
    let registry = CategoryRegistry::new();
    let proxy = registry.get("render");

    {
        let _span = ScopeSpan::new(&log, proxy, "frame");
        record_begin(&log, "render", "frame");
    }
    log.flush();

    let lines = event_lines(&sink);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"ph\":\"B\""));
    assert!(lines[1].contains("\"ph\":\"E\""));
    assert!(lines[1].contains("\"cat\":\"render\""));
    assert!(lines[1].contains("\"name\":\"frame\""));
}

#[test]
fn test_scope_skips_disabled_category() {
    let (log, _clock, sink) = manual_log();
    let registry = CategoryRegistry::new();
    registry.set_enabled_list("-render");
    let proxy = registry.get("render");
    assert!(!proxy.enabled());

    {
        let _span = ScopeSpan::new(&log, proxy, "frame");
        if proxy.enabled() {
            record_begin(&log, "render", "frame");
        }
    }
    log.flush();
    assert!(event_lines(&sink).is_empty());
}

#[test]
fn test_scope_observes_disable_during_lifetime() {
    let (log, _clock, sink) = manual_log();
    let registry = CategoryRegistry::new();
    let proxy = registry.get("render");

    {
        let _span = ScopeSpan::new(&log, proxy, "frame");
        if proxy.enabled() {
            record_begin(&log, "render", "frame");
        }
        // the proxy is live: the span sees the disable at drop time
        registry.set_enabled_list("-render");
    }
    log.flush();

    let lines = event_lines(&sink);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("\"ph\":\"B\""));
}

#[test]
fn test_threshold_scope_kept_when_held_long_enough() {
    let (log, clock, sink) = manual_log();
    let registry = CategoryRegistry::new();
    let proxy = registry.get("slowpath");
    let threshold_ns = 42_000;

    {
        let span = ThresholdScopeSpan::new(&log, proxy, "maybe-slow", threshold_ns);
        if proxy.enabled() {
            let begin_id = record_begin(&log, "slowpath", "maybe-slow");
            span.set_threshold_begin_id(begin_id);
        }
        clock.advance(threshold_ns);
    }
    log.flush();

    let lines = event_lines(&sink);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"ph\":\"B\""));
    assert!(lines[1].contains("\"ph\":\"E\""));
}

#[test]
fn test_threshold_scope_discarded_when_too_short() {
    let (log, clock, sink) = manual_log();
    let registry = CategoryRegistry::new();
    let proxy = registry.get("slowpath");
    let threshold_ns = 42_000;

    {
        let span = ThresholdScopeSpan::new(&log, proxy, "too-fast", threshold_ns);
        if proxy.enabled() {
            let begin_id = record_begin(&log, "slowpath", "too-fast");
            span.set_threshold_begin_id(begin_id);
        }
        clock.advance(40_000);
    }

    // both halves vanished and the next id reuses the BEGIN's slot
    assert_eq!(log.event_count(), 0);
    assert_eq!(record_begin(&log, "slowpath", "next"), 0);

    log.flush();
    let lines = event_lines(&sink);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("\"name\":\"next\""));
}

#[test]
fn test_threshold_scope_without_begin_id_records_end() {
    let (log, _clock, sink) = manual_log();
    let registry = CategoryRegistry::new();
    let proxy = registry.get("slowpath");

    {
        // the site never stored a begin id (e.g. its BEGIN was dropped on a
        // full buffer); the END goes through untracked
        let _span = ThresholdScopeSpan::new(&log, proxy, "orphan", 42_000);
    }
    log.flush();

    let lines = event_lines(&sink);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("\"ph\":\"E\""));
}
