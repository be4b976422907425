//! Filtering, sorting, and pagination types for the Storage Port.

use serde_json::Value;
use std::collections::HashMap;

/// A document as stored by the Storage Port: a flat JSON object plus the
/// bookkeeping fields every collection carries.
pub type Document = Value;

/// Equality filter over a collection's fields. An empty filter matches
/// every document in the collection.
#[derive(Debug, Clone, Default)]
pub struct Filter(HashMap<String, Value>);

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn matches(&self, doc: &Value) -> bool {
        self.0.iter().all(|(field, expected)| doc.get(field) == Some(expected))
    }
}

/// Sort direction for `iterate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// A single-field sort applied by `iterate`.
#[derive(Debug, Clone)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    #[must_use]
    pub fn by(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    #[must_use]
    pub fn descending(field: impl Into<String>) -> Self {
        Self::by(field, SortDirection::Descending)
    }
}

/// A single page of an `iterate` call.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub skip: u64,
    pub limit: u64,
}

impl Page {
    #[must_use]
    pub fn new(skip: u64, limit: u64) -> Self {
        Self { skip, limit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&json!({"a": 1})));
    }

    #[test]
    fn filter_matches_on_exact_field_equality() {
        let filter = Filter::new().eq("tenant", "acme");
        assert!(filter.matches(&json!({"tenant": "acme", "x": 1})));
        assert!(!filter.matches(&json!({"tenant": "other"})));
        assert!(!filter.matches(&json!({"x": 1})));
    }
}
