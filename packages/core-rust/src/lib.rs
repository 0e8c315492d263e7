//! Piscola core — item model, glob pattern matching, and wire message schemas.

pub mod messages;
pub mod pattern;
pub mod query;
pub mod types;

pub use messages::{ErrorPayload, Message};
pub use pattern::{GlobPattern, PatternError, PatternErrorKind};
pub use query::{AdvancedQuery, Collector, Query, SearchResult};
pub use types::{AttrValue, Attributes, Item, ItemId, ItemTime};
