use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier of an item. Immutable once the item is stored.
pub type ItemId = i32;

/// Secondary-index key of an item. Larger values are more recent.
pub type ItemTime = i32;

/// Attribute value attached to an item.
///
/// Attributes are compared for exact equality only. Serialized untagged, so
/// `true` and `"blue"` are both valid wire representations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Boolean flag attribute.
    Bool(bool),
    /// Free-form string attribute.
    String(String),
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// Attribute name to value mapping.
///
/// `BTreeMap` keeps serialization order deterministic.
pub type Attributes = BTreeMap<String, AttrValue>;

/// A record under management.
///
/// `value` is the subject of pattern matching; `time` orders search results
/// (most recent first). Soft-deleted items stay stored but are hidden from
/// searches unless a query asks for them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique identifier.
    pub id: ItemId,
    /// Secondary-index key.
    pub time: ItemTime,
    /// String matched against glob patterns.
    pub value: String,
    /// Soft-delete flag.
    #[serde(default)]
    pub deleted: bool,
    /// Exact-match attributes used by advanced lookups.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
}

impl Item {
    /// Creates a live item with no attributes.
    #[must_use]
    pub fn new(id: ItemId, time: ItemTime, value: impl Into<String>) -> Self {
        Self {
            id,
            time,
            value: value.into(),
            deleted: false,
            attributes: Attributes::new(),
        }
    }

    /// Marks the item as soft-deleted.
    #[must_use]
    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// Adds a single attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Returns `true` if every `(name, value)` pair in `required` is present
    /// on this item with an equal value. An empty requirement always holds.
    #[must_use]
    pub fn has_attributes(&self, required: &Attributes) -> bool {
        required
            .iter()
            .all(|(name, want)| self.attributes.get(name) == Some(want))
    }
}
