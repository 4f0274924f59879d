//! Subscription filters.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::entry::LogEntry;

/// How a single field is matched.
#[derive(Clone)]
pub enum FieldMatcher {
    /// Field equals the value exactly.
    Equals(Value),
    /// Field is one of the listed values.
    OneOf(Vec<Value>),
    /// Field, rendered as a string, matches the regex.
    Matches(Regex),
    /// Arbitrary predicate over the field value.
    Predicate(Arc<dyn Fn(&Value) -> bool + Send + Sync>),
}

impl std::fmt::Debug for FieldMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equals(v) => f.debug_tuple("Equals").field(v).finish(),
            Self::OneOf(vs) => f.debug_tuple("OneOf").field(vs).finish(),
            Self::Matches(re) => f.debug_tuple("Matches").field(&re.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl FieldMatcher {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Equals(expected) => value == expected,
            Self::OneOf(allowed) => allowed.contains(value),
            Self::Matches(re) => match value {
                Value::String(s) => re.is_match(s),
                other => re.is_match(&other.to_string()),
            },
            Self::Predicate(pred) => pred(value),
        }
    }
}

/// Filter over log entries: a map of field name to matcher.
///
/// An empty filter matches every entry. A field named in the filter but
/// missing from the entry fails the match.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    matchers: HashMap<String, FieldMatcher>,
}

impl LogFilter {
    /// Create an empty filter (matches everything).
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Require a field to equal a value.
    #[must_use]
    pub fn field_eq(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.matchers
            .insert(name.into(), FieldMatcher::Equals(value.into()));
        self
    }

    /// Require a field to be one of the listed values.
    #[must_use]
    pub fn field_in(mut self, name: impl Into<String>, values: Vec<Value>) -> Self {
        self.matchers.insert(name.into(), FieldMatcher::OneOf(values));
        self
    }

    /// Require a field to match a regex.
    #[must_use]
    pub fn field_matches(mut self, name: impl Into<String>, re: Regex) -> Self {
        self.matchers.insert(name.into(), FieldMatcher::Matches(re));
        self
    }

    /// Require a field to satisfy a predicate.
    #[must_use]
    pub fn field_where(
        mut self,
        name: impl Into<String>,
        pred: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.matchers
            .insert(name.into(), FieldMatcher::Predicate(Arc::new(pred)));
        self
    }

    /// Convenience: filter on the entry type.
    #[must_use]
    pub fn entry_type(self, ty: impl Into<String>) -> Self {
        self.field_eq("type", ty.into())
    }

    /// Whether the entry passes this filter.
    #[must_use]
    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.matchers.iter().all(|(name, matcher)| {
            entry
                .field(name)
                .is_some_and(|value| matcher.matches(&value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_everything() {
        let entry = LogEntry::new("anything");
        assert!(LogFilter::all().matches(&entry));
    }

    #[test]
    fn test_field_eq() {
        let entry = LogEntry::new("tool_call").with_agent("backend");
        assert!(LogFilter::all().entry_type("tool_call").matches(&entry));
        assert!(!LogFilter::all().entry_type("tool_result").matches(&entry));
    }

    #[test]
    fn test_missing_field_fails() {
        let entry = LogEntry::new("tool_call");
        assert!(!LogFilter::all()
            .field_eq("agent", "backend")
            .matches(&entry));
    }

    #[test]
    fn test_field_in_and_regex() {
        let entry = LogEntry::new("pre_delegation").with_field("to", "researcher");

        let membership = LogFilter::all().field_in(
            "type",
            vec!["pre_delegation".into(), "post_delegation".into()],
        );
        assert!(membership.matches(&entry));

        let re = Regex::new("^re.*er$").unwrap();
        assert!(LogFilter::all().field_matches("to", re).matches(&entry));
    }

    #[test]
    fn test_predicate() {
        let entry = LogEntry::new("context_limit_warning").with_field("usage_pct", 87);
        let filter = LogFilter::all()
            .field_where("usage_pct", |v| v.as_u64().is_some_and(|n| n >= 85));
        assert!(filter.matches(&entry));
    }
}
