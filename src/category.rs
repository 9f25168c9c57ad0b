//! Category registry and regex-based enable/disable filtering
//!
//! Every instrumentation site tags its events with a category name and gates
//! recording on that category's enable bit. The process-wide registry hands
//! out lightweight proxies bound to the live bit, so replacing the filter
//! flips existing sites without re-resolving anything.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use regex::Regex;

/// Capacity of the process-wide registry. Exceeding it yields the sentinel
/// entry, which is permanently disabled.
pub const MAX_CATEGORIES: usize = 100;

struct FilterRule {
    pattern: String,
    enable: bool,
    regex: Regex,
}

/// Ordered list of regex rules parsed from a comma-separated string.
///
/// Each token may carry a leading `-` (disable) or `+` (enable, the default
/// and therefore redundant). Matching is unanchored substring search, and the
/// first matching rule wins regardless of later rules.
#[derive(Default)]
pub struct CategoryFilter {
    source: String,
    rules: Vec<FilterRule>,
}

impl CategoryFilter {
    /// Parses `list`. A token that fails to compile is reported on the
    /// diagnostics channel and dropped; the rest of the filter stays usable.
    pub fn new(list: &str) -> Self {
        let mut rules = Vec::new();
        for token in list.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (enable, pattern) = match token.as_bytes()[0] {
                b'-' => (false, &token[1..]),
                b'+' => (true, &token[1..]),
                _ => (true, token),
            };
            match Regex::new(pattern) {
                Ok(regex) => rules.push(FilterRule {
                    pattern: pattern.to_owned(),
                    enable,
                    regex,
                }),
                Err(err) => {
                    log::warn!("category filter regex '{token}' dropped: {err}");
                }
            }
        }
        Self {
            source: list.to_owned(),
            rules,
        }
    }

    /// The original comma-separated list this filter was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of rules that compiled.
    pub fn count(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns `(matched, enabled)` for `category_name`. With no rules, or
    /// when no rule matches, the verdict is `(false, true)`: unmatched
    /// categories default to enabled.
    pub fn classify(&self, category_name: &str) -> (bool, bool) {
        for rule in &self.rules {
            if rule.regex.is_match(category_name) {
                return (true, rule.enable);
            }
        }
        (false, true)
    }

    /// The compiled rule patterns, prefixes stripped, in match order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.pattern.as_str())
    }
}

/// One registry slot: the identity key plus the live enable bit.
pub struct CategoryEntry {
    name: &'static str,
    enabled: AtomicBool,
}

impl CategoryEntry {
    const fn new(name: &'static str, enabled: bool) -> Self {
        Self {
            name,
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }
}

/// Handle to a registry entry. Copies are cheap and the enable bit is live:
/// a later `set_enabled_list` is observable through proxies handed out
/// earlier.
#[derive(Clone, Copy)]
pub struct CategoryProxy {
    entry: &'static CategoryEntry,
}

impl CategoryProxy {
    pub fn name(&self) -> &'static str {
        self.entry.name()
    }

    pub fn enabled(&self) -> bool {
        self.entry.enabled()
    }
}

/// Returned once the registry is full; recording through it is a no-op.
static EXHAUSTED: CategoryEntry = CategoryEntry::new("tracing categories exhausted.", false);

struct RegistryState {
    // Entries are leaked so proxies can hold &'static references; the
    // registry is process-wide and bounded by MAX_CATEGORIES.
    entries: Vec<&'static CategoryEntry>,
    filter: CategoryFilter,
}

/// Process-wide set of `(name, enabled)` category entries.
pub struct CategoryRegistry {
    state: Mutex<RegistryState>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                entries: Vec::with_capacity(MAX_CATEGORIES),
                filter: CategoryFilter::default(),
            }),
        }
    }

    /// Finds `category_name`, creating the entry if the registry still has
    /// capacity. A newly created entry takes its enable bit from the current
    /// filter's verdict, which defaults to enabled when nothing matches.
    pub fn get(&self, category_name: &'static str) -> CategoryProxy {
        let mut state = self.state.lock().unwrap();

        if let Some(entry) = state
            .entries
            .iter()
            .find(|e| e.name() == category_name)
            .copied()
        {
            return CategoryProxy { entry };
        }

        if state.entries.len() < MAX_CATEGORIES {
            let (_, enabled) = state.filter.classify(category_name);
            let entry: &'static CategoryEntry =
                Box::leak(Box::new(CategoryEntry::new(category_name, enabled)));
            state.entries.push(entry);
            return CategoryProxy { entry };
        }

        // must increase MAX_CATEGORIES
        CategoryProxy { entry: &EXHAUSTED }
    }

    /// Bulk insert of `(name, enabled)` pairs. Names already present keep
    /// their existing entry.
    pub fn append(&self, categories: &[(&'static str, bool)]) {
        let mut state = self.state.lock().unwrap();
        assert!(
            state.entries.len() + categories.len() <= MAX_CATEGORIES,
            "appending {} categories exceeds capacity",
            categories.len()
        );
        for &(name, enabled) in categories {
            if state.entries.iter().any(|e| e.name() == name) {
                continue;
            }
            let entry: &'static CategoryEntry =
                Box::leak(Box::new(CategoryEntry::new(name, enabled)));
            state.entries.push(entry);
        }
    }

    /// Known category names, in insertion order. Grows as new code paths are
    /// reached.
    pub fn known_categories(&self) -> Vec<&'static str> {
        let state = self.state.lock().unwrap();
        state.entries.iter().map(|e| e.name()).collect()
    }

    pub fn known_count(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    /// Replaces the active filter and re-applies it: every existing entry
    /// the new filter matches takes the filter's verdict, unmatched entries
    /// are left untouched.
    pub fn set_filter(&self, filter: CategoryFilter) {
        let mut state = self.state.lock().unwrap();
        state.filter = filter;
        for entry in &state.entries {
            let (matched, enable) = state.filter.classify(entry.name());
            if matched {
                entry.set_enabled(enable);
            }
        }
    }

    /// Convenience for `set_filter(CategoryFilter::new(list))`.
    pub fn set_enabled_list(&self, list: &str) {
        self.set_filter(CategoryFilter::new(list));
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static::lazy_static! {
    static ref REGISTRY: CategoryRegistry = CategoryRegistry::new();
}

/// The process-wide registry used by the instrumentation macros.
pub fn registry() -> &'static CategoryRegistry {
    &REGISTRY
}

/// Shorthand for `registry().get(name)`.
pub fn get(category_name: &'static str) -> CategoryProxy {
    REGISTRY.get(category_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_first_match_wins() {
        let filter = CategoryFilter::new("foo, -bar");
        assert_eq!(filter.count(), 2);

        assert_eq!(filter.classify("foo"), (true, true));
        assert_eq!(filter.classify("foot"), (true, true));
        // 'foo' appears in the name, and the foo rule is checked first
        assert_eq!(filter.classify("barfooted"), (true, true));
        assert_eq!(filter.classify("bar"), (true, false));
        assert_eq!(filter.classify("bart"), (true, false));
        assert_eq!(filter.classify("centibar"), (true, false));
        assert_eq!(filter.classify("qux"), (false, true));
    }

    #[test]
    fn test_empty_filter_defaults_to_enabled() {
        let filter = CategoryFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.classify("anything"), (false, true));
    }

    #[test]
    fn test_explicit_plus_prefix() {
        let filter = CategoryFilter::new("+foo, -bar");
        assert_eq!(filter.classify("foo"), (true, true));
        assert_eq!(filter.classify("bar"), (true, false));
        assert_eq!(filter.patterns().collect::<Vec<_>>(), vec!["foo", "bar"]);
    }

    #[test]
    fn test_bad_token_is_dropped_not_fatal() {
        let filter = CategoryFilter::new("foo, [invalid, -bar");
        assert_eq!(filter.count(), 2);
        assert_eq!(filter.classify("bar"), (true, false));
    }

    #[test]
    fn test_whitespace_and_empty_tokens() {
        let filter = CategoryFilter::new(" foo ,, -bar ,");
        assert_eq!(filter.count(), 2);
        assert_eq!(filter.classify("foo"), (true, true));
    }

    #[test]
    fn test_registry_create_and_reuse() {
        let registry = CategoryRegistry::new();
        registry.append(&[("foo", true), ("bar", false)]);

        assert!(registry.get("foo").enabled());
        assert!(!registry.get("bar").enabled());

        // unknown names are created enabled while the filter is empty
        assert!(registry.get("foo2").enabled());
        assert!(registry.get("bar2").enabled());

        assert_eq!(
            registry.known_categories(),
            vec!["foo", "bar", "foo2", "bar2"]
        );
    }

    #[test]
    fn test_set_filter_reapplies_to_existing_entries() {
        let registry = CategoryRegistry::new();
        registry.append(&[("foo", true), ("bar", false)]);
        let _ = registry.get("foo2");
        let _ = registry.get("bar2");

        registry.set_filter(CategoryFilter::new("foo2, -bar2"));
        assert!(registry.get("foo").enabled()); // not matched, untouched
        assert!(!registry.get("bar").enabled()); // not matched, untouched
        assert!(registry.get("foo2").enabled());
        assert!(!registry.get("bar2").enabled());

        // inverse filter flips both
        registry.set_enabled_list("-foo2, bar2");
        assert!(!registry.get("foo2").enabled());
        assert!(registry.get("bar2").enabled());
    }

    #[test]
    fn test_proxy_is_live() {
        let registry = CategoryRegistry::new();
        let proxy = registry.get("batz");
        assert!(proxy.enabled());
        registry.set_enabled_list("-batz");
        assert!(!proxy.enabled());
    }

    #[test]
    fn test_filter_applies_to_future_entries() {
        let registry = CategoryRegistry::new();
        registry.set_enabled_list("-quiet");
        assert!(!registry.get("quiet-subsystem").enabled());
        assert!(registry.get("loud-subsystem").enabled());
    }

    #[test]
    fn test_capacity_exhaustion_yields_disabled_sentinel() {
        // leak is bounded: the test registry is dropped but its entries are
        // intentionally 'static, same as the process-wide one
        let registry = CategoryRegistry::new();
        let names: Vec<String> = (0..MAX_CATEGORIES).map(|i| format!("cat-{i}")).collect();
        for name in &names {
            let leaked: &'static str = Box::leak(name.clone().into_boxed_str());
            let _ = registry.get(leaked);
        }
        assert_eq!(registry.known_count(), MAX_CATEGORIES);

        let proxy = registry.get("one-too-many");
        assert!(!proxy.enabled());
        assert_eq!(proxy.name(), "tracing categories exhausted.");
        assert_eq!(registry.known_count(), MAX_CATEGORIES);
    }
}
