//! Query and result shapes for item lookups.

use serde::{Deserialize, Serialize};

use crate::types::{Attributes, ItemId};

/// Single-pattern lookup over non-deleted items.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// Glob pattern matched against the whole item value.
    pub pattern: String,
    /// Maximum number of ids returned.
    pub limit: u32,
    /// When `false` the scan stops as soon as `limit` ids are collected.
    /// When `true` it runs to the end so `total` is exact.
    #[serde(default)]
    pub total_required: bool,
}

impl Query {
    /// Creates a query that stops once `limit` ids are found.
    #[must_use]
    pub fn new(pattern: impl Into<String>, limit: u32) -> Self {
        Self {
            pattern: pattern.into(),
            limit,
            total_required: false,
        }
    }

    /// Requests an exact total match count.
    #[must_use]
    pub fn with_total(mut self) -> Self {
        self.total_required = true;
        self
    }
}

/// Multi-pattern lookup with soft-delete and attribute filtering.
///
/// An item matches when it matches every include pattern, no exclude
/// pattern, and carries every attribute in `with_attributes`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedQuery {
    /// Patterns that must all match.
    #[serde(default)]
    pub include_patterns: Vec<String>,
    /// Patterns of which none may match.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Maximum number of ids returned.
    pub limit: u32,
    /// See [`Query::total_required`].
    #[serde(default)]
    pub total_required: bool,
    /// Also consider soft-deleted items.
    #[serde(default)]
    pub include_deleted: bool,
    /// Required exact attribute values.
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub with_attributes: Attributes,
}

/// Lookup outcome.
///
/// `ids` is ordered most-recent first and never longer than the query's
/// `limit`. `total` counts every match seen; it is only exact when the
/// query set `total_required` or the scan was not cut short.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Matched ids, most recent first.
    pub ids: Vec<ItemId>,
    /// Number of matches counted.
    pub total: u32,
}

/// Accumulates matches for a query and decides when the scan may stop.
///
/// ```
/// use piscola_core::query::Collector;
///
/// let mut c = Collector::new(2, false);
/// assert!(!c.accept(10));
/// assert!(c.accept(11)); // limit reached, scan may stop
/// assert_eq!(c.finish().ids, vec![10, 11]);
/// ```
#[derive(Debug)]
pub struct Collector {
    limit: u32,
    total_required: bool,
    result: SearchResult,
}

impl Collector {
    /// Creates a collector for the given limit and count mode.
    #[must_use]
    pub fn new(limit: u32, total_required: bool) -> Self {
        Self {
            limit,
            total_required,
            result: SearchResult::default(),
        }
    }

    /// Records a match. Returns `true` when the scan should stop.
    pub fn accept(&mut self, id: ItemId) -> bool {
        if self.result.total < self.limit {
            self.result.ids.push(id);
        }
        self.result.total = self.result.total.saturating_add(1);

        self.result.total == self.limit && !self.total_required
    }

    /// Consumes the collector, returning the accumulated result.
    #[must_use]
    pub fn finish(self) -> SearchResult {
        self.result
    }
}
