//! Item store trait and its error type.
//!
//! Defines [`ItemStore`], the contract between the service layer and the
//! in-memory index. Every method is one atomic critical section: mutations
//! take exclusive access, reads take shared access, and no caller ever sees
//! the two internal indices disagree.

use piscola_core::{AdvancedQuery, Item, ItemId, ItemTime, PatternError, Query, SearchResult};

/// Errors returned by [`ItemStore`] operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A query pattern failed to compile. Nothing was read or changed.
    #[error(transparent)]
    InvalidPattern(#[from] PatternError),

    /// The primary map and the time index disagree about `id`.
    ///
    /// Must never occur in correct operation. Callers treat it as fatal and
    /// stop serving rather than retrying.
    #[error("index corrupted: item {id} missing from time bucket {time}")]
    IndexCorrupted { id: ItemId, time: ItemTime },
}

impl StoreError {
    /// Returns `true` for faults that mean the store can no longer be trusted.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::IndexCorrupted { .. })
    }
}

/// In-memory item storage with glob and attribute search.
///
/// Wrapped in `Arc<dyn ItemStore>` for sharing across async boundaries.
/// All operations are synchronous and bounded by the number of stored items.
pub trait ItemStore: Send + Sync + 'static {
    /// Inserts a new item. Returns `false` (no change) if the id is taken.
    fn add(&self, item: Item) -> bool;

    /// Inserts `item`, or overwrites every field of the stored item with the
    /// same id, moving it to its new time bucket if `time` changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IndexCorrupted`] if the stored item is missing
    /// from its time bucket.
    fn put(&self, item: Item) -> Result<bool, StoreError>;

    /// Removes the item with `id`. Returns `Ok(false)` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IndexCorrupted`] if the item is missing from its
    /// time bucket.
    fn remove(&self, id: ItemId) -> Result<bool, StoreError>;

    /// Number of stored items, soft-deleted ones included.
    fn size(&self) -> usize;

    /// Copy of the stored item with `id`.
    fn get(&self, id: ItemId) -> Option<Item>;

    /// Whether an item with `id` is stored.
    fn contains(&self, id: ItemId) -> bool;

    /// Non-deleted items whose value matches `query.pattern`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPattern`] if the pattern is malformed, or
    /// [`StoreError::IndexCorrupted`] if the indices disagree.
    fn lookup(&self, query: &Query) -> Result<SearchResult, StoreError>;

    /// Items passing the deleted, attribute, include and exclude filters of
    /// `query`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPattern`] if any pattern is malformed, or
    /// [`StoreError::IndexCorrupted`] if the indices disagree.
    fn lookup_advanced(&self, query: &AdvancedQuery) -> Result<SearchResult, StoreError>;
}
