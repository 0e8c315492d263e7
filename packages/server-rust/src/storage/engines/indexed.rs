//! In-memory [`ItemStore`] implementation backed by a hash map plus a
//! time-ordered index, both behind one [`RwLock`].
//!
//! The two indices are only ever touched together under the same lock, so
//! readers never observe them out of step. Patterns are compiled before the
//! lock is taken; result assembly happens under the read lock.

use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;
use piscola_core::pattern::matches_all;
use piscola_core::{AdvancedQuery, Collector, GlobPattern, Item, ItemId, Query, SearchResult};
use tracing::error;

use crate::storage::engine::{ItemStore, StoreError};
use crate::storage::time_index::TimeIndex;

/// Primary map and time index, always mutated as a unit.
#[derive(Debug, Default)]
struct Indexes {
    items: AHashMap<ItemId, Item>,
    by_time: TimeIndex,
}

impl Indexes {
    /// Walks items most recent first, feeding those accepted by `filter`
    /// into a collector until it asks to stop.
    fn scan<F>(&self, limit: u32, total_required: bool, filter: F) -> Result<SearchResult, StoreError>
    where
        F: Fn(&Item) -> bool,
    {
        let mut collector = Collector::new(limit, total_required);

        for (time, ids) in self.by_time.buckets_desc() {
            for &id in ids {
                let item = self
                    .items
                    .get(&id)
                    .ok_or(StoreError::IndexCorrupted { id, time })?;
                if filter(item) && collector.accept(id) {
                    return Ok(collector.finish());
                }
            }
        }

        Ok(collector.finish())
    }
}

/// Indexed item store.
///
/// Items are keyed by id in a hash map and ordered by `time` in a
/// [`TimeIndex`]. Searches walk the time index newest first and resolve
/// each id through the map.
#[derive(Debug, Default)]
pub struct IndexedStore {
    inner: RwLock<Indexes>,
}

impl IndexedStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks that both indices agree: every stored id sits in exactly one
    /// bucket keyed by its current time, and no bucket names an unknown id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IndexCorrupted`] naming the first offending id.
    pub fn validate(&self) -> Result<(), StoreError> {
        let idx = self.inner.read();
        let mut seen = AHashSet::with_capacity(idx.items.len());

        for (time, ids) in idx.by_time.buckets_desc() {
            if ids.is_empty() {
                return Err(StoreError::IndexCorrupted { id: 0, time });
            }
            for &id in ids {
                let in_place = idx.items.get(&id).is_some_and(|item| item.time == time);
                if !in_place || !seen.insert(id) {
                    return Err(StoreError::IndexCorrupted { id, time });
                }
            }
        }

        match idx.items.values().find(|item| !seen.contains(&item.id)) {
            Some(item) => Err(StoreError::IndexCorrupted {
                id: item.id,
                time: item.time,
            }),
            None => Ok(()),
        }
    }
}

impl ItemStore for IndexedStore {
    fn add(&self, item: Item) -> bool {
        let mut idx = self.inner.write();
        if idx.items.contains_key(&item.id) {
            return false;
        }

        idx.by_time.insert(item.time, item.id);
        idx.items.insert(item.id, item);
        true
    }

    fn put(&self, item: Item) -> Result<bool, StoreError> {
        let mut guard = self.inner.write();
        let Indexes { items, by_time } = &mut *guard;

        if let Some(current) = items.get_mut(&item.id) {
            if current.time != item.time {
                if !by_time.remove(current.time, item.id) {
                    error!(id = item.id, time = current.time, "item missing from its time bucket");
                    return Err(StoreError::IndexCorrupted {
                        id: item.id,
                        time: current.time,
                    });
                }
                by_time.insert(item.time, item.id);
            }
            *current = item;
            return Ok(true);
        }

        by_time.insert(item.time, item.id);
        items.insert(item.id, item);
        Ok(true)
    }

    fn remove(&self, id: ItemId) -> Result<bool, StoreError> {
        let mut idx = self.inner.write();
        let Some(time) = idx.items.get(&id).map(|item| item.time) else {
            return Ok(false);
        };

        if !idx.by_time.remove(time, id) {
            error!(id, time, "item missing from its time bucket");
            return Err(StoreError::IndexCorrupted { id, time });
        }
        idx.items.remove(&id);
        Ok(true)
    }

    fn size(&self) -> usize {
        self.inner.read().items.len()
    }

    fn get(&self, id: ItemId) -> Option<Item> {
        self.inner.read().items.get(&id).cloned()
    }

    fn contains(&self, id: ItemId) -> bool {
        self.inner.read().items.contains_key(&id)
    }

    fn lookup(&self, query: &Query) -> Result<SearchResult, StoreError> {
        let pattern = GlobPattern::compile(&query.pattern)?;

        let idx = self.inner.read();
        idx.scan(query.limit, query.total_required, |item| {
            !item.deleted && pattern.is_match(&item.value)
        })
    }

    fn lookup_advanced(&self, query: &AdvancedQuery) -> Result<SearchResult, StoreError> {
        let include = GlobPattern::compile_all(&query.include_patterns)?;
        let exclude = GlobPattern::compile_all(&query.exclude_patterns)?;

        let idx = self.inner.read();
        idx.scan(query.limit, query.total_required, |item| {
            (query.include_deleted || !item.deleted)
                && item.has_attributes(&query.with_attributes)
                && matches_all(&item.value, &include, &exclude)
        })
    }
}
