//! Instrumentation macros
//!
//! Every macro resolves its category proxy once per call site through a local
//! static, then skips recording entirely when the category is disabled.
//! Category and event names must be string literals or other `'static`
//! strings.

/// Memoizes the category proxy for one instrumentation site.
#[doc(hidden)]
#[macro_export]
macro_rules! __trace_site_proxy {
    ($category:expr) => {{
        static SITE: ::std::sync::OnceLock<$crate::category::CategoryProxy> =
            ::std::sync::OnceLock::new();
        *SITE.get_or_init(|| $crate::category::get($category))
    }};
}

/// Records a begin/end pair around the current scope.
///
/// ```
/// # use chrometrace::trace_scope;
/// fn parse() {
///     trace_scope!("parser", "parse");
///     // traced until the end of the function
/// }
/// # parse();
/// ```
#[macro_export]
macro_rules! trace_scope {
    ($category:expr, $event_name:expr) => {
        let __trace_proxy = $crate::__trace_site_proxy!($category);
        let __trace_span = $crate::scope::ScopeSpan::new(
            $crate::dispatch::TraceLog::global(),
            __trace_proxy,
            $event_name,
        );
        if __trace_proxy.enabled() {
            $crate::dispatch::add_event(
                $crate::event::Phase::Begin,
                __trace_proxy.name(),
                $event_name,
                $crate::trace_id::TraceId::NONE,
                $crate::event::EventFlags::empty(),
            );
        }
    };
}

/// Records a begin/end pair around the current scope, discarded from the
/// buffer when the scope lasted less than `threshold_ns`.
#[macro_export]
macro_rules! trace_scope_if_longer_than {
    ($threshold_ns:expr, $category:expr, $event_name:expr) => {
        let __trace_proxy = $crate::__trace_site_proxy!($category);
        let __trace_span = $crate::scope::ThresholdScopeSpan::new(
            $crate::dispatch::TraceLog::global(),
            __trace_proxy,
            $event_name,
            $threshold_ns,
        );
        if __trace_proxy.enabled() {
            let __trace_begin_id = $crate::dispatch::add_event(
                $crate::event::Phase::Begin,
                __trace_proxy.name(),
                $event_name,
                $crate::trace_id::TraceId::NONE,
                $crate::event::EventFlags::empty(),
            );
            __trace_span.set_threshold_begin_id(__trace_begin_id);
        }
    };
}

/// Records a single event of the given phase, with an optional
/// `key => value` argument.
#[doc(hidden)]
#[macro_export]
macro_rules! __trace_single_event {
    ($phase:expr, $category:expr, $event_name:expr) => {{
        let __trace_proxy = $crate::__trace_site_proxy!($category);
        if __trace_proxy.enabled() {
            $crate::dispatch::add_event(
                $phase,
                __trace_proxy.name(),
                $event_name,
                $crate::trace_id::TraceId::NONE,
                $crate::event::EventFlags::empty(),
            );
        }
    }};
    ($phase:expr, $category:expr, $event_name:expr, $arg_name:expr => $arg_value:expr) => {{
        let __trace_proxy = $crate::__trace_site_proxy!($category);
        if __trace_proxy.enabled() {
            $crate::dispatch::add_event_with_arg(
                $phase,
                __trace_proxy.name(),
                $event_name,
                $crate::trace_id::TraceId::NONE,
                $crate::event::EventFlags::empty(),
                $arg_name,
                $arg_value,
            );
        }
    }};
}

/// Records a single BEGIN event immediately.
#[macro_export]
macro_rules! trace_begin {
    ($category:expr, $event_name:expr $(, $arg_name:expr => $arg_value:expr)?) => {
        $crate::__trace_single_event!(
            $crate::event::Phase::Begin, $category, $event_name $(, $arg_name => $arg_value)?
        )
    };
}

/// Records a single END event immediately.
#[macro_export]
macro_rules! trace_end {
    ($category:expr, $event_name:expr $(, $arg_name:expr => $arg_value:expr)?) => {
        $crate::__trace_single_event!(
            $crate::event::Phase::End, $category, $event_name $(, $arg_name => $arg_value)?
        )
    };
}

/// Records an instant event.
///
/// ```
/// # use chrometrace::trace_instant;
/// trace_instant!("io", "cache-miss");
/// trace_instant!("io", "cache-miss", "key" => "index.html");
/// ```
#[macro_export]
macro_rules! trace_instant {
    ($category:expr, $event_name:expr $(, $arg_name:expr => $arg_value:expr)?) => {
        $crate::__trace_single_event!(
            $crate::event::Phase::Instant, $category, $event_name $(, $arg_name => $arg_value)?
        )
    };
}

/// Records the value of a counter. The value must be representable as a
/// 64-bit integer.
#[macro_export]
macro_rules! trace_counter {
    ($category:expr, $event_name:expr, $value:expr) => {
        $crate::__trace_single_event!(
            $crate::event::Phase::Counter, $category, $event_name, "value" => ($value) as i64
        )
    };
}

/// Records a counter disambiguated by an id. The id shows up in the `id`
/// field of the serialized event.
#[macro_export]
macro_rules! trace_counter_id {
    ($category:expr, $event_name:expr, $id:expr, $value:expr) => {{
        let __trace_proxy = $crate::__trace_site_proxy!($category);
        if __trace_proxy.enabled() {
            $crate::dispatch::add_event_with_arg(
                $crate::event::Phase::Counter,
                __trace_proxy.name(),
                $event_name,
                $crate::trace_id::TraceId::from_int(($id) as u64).value(),
                $crate::event::EventFlags::HAS_ID,
                "value",
                ($value) as i64,
            );
        }
    }};
}

/// Starts an asynchronous operation. All events of one operation must share
/// category, name and id.
#[macro_export]
macro_rules! trace_async_begin {
    ($category:expr, $event_name:expr, $id:expr) => {{
        let __trace_proxy = $crate::__trace_site_proxy!($category);
        if __trace_proxy.enabled() {
            $crate::dispatch::add_event(
                $crate::event::Phase::AsyncBegin,
                __trace_proxy.name(),
                $event_name,
                $crate::trace_id::TraceId::from_int(($id) as u64).value(),
                $crate::event::EventFlags::HAS_ID,
            );
        }
    }};
}

/// Marks the next phase of an asynchronous operation.
#[macro_export]
macro_rules! trace_async_step {
    ($category:expr, $event_name:expr, $id:expr, $step:expr) => {{
        let __trace_proxy = $crate::__trace_site_proxy!($category);
        if __trace_proxy.enabled() {
            $crate::dispatch::add_event_with_arg(
                $crate::event::Phase::AsyncStep,
                __trace_proxy.name(),
                $event_name,
                $crate::trace_id::TraceId::from_int(($id) as u64).value(),
                $crate::event::EventFlags::HAS_ID,
                "step",
                $step,
            );
        }
    }};
}

/// Finishes an asynchronous operation.
#[macro_export]
macro_rules! trace_async_end {
    ($category:expr, $event_name:expr, $id:expr) => {{
        let __trace_proxy = $crate::__trace_site_proxy!($category);
        if __trace_proxy.enabled() {
            $crate::dispatch::add_event(
                $crate::event::Phase::AsyncEnd,
                __trace_proxy.name(),
                $event_name,
                $crate::trace_id::TraceId::from_int(($id) as u64).value(),
                $crate::event::EventFlags::HAS_ID,
            );
        }
    }};
}
