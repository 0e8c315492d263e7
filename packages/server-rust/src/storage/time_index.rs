//! Time-ordered secondary index.
//!
//! Maps each `time` to the ids sharing it, in insertion order. Buckets are
//! never left empty: removing the last id of a bucket drops the bucket.

use std::collections::BTreeMap;

use piscola_core::{ItemId, ItemTime};

/// Ordered `time -> [id]` index.
#[derive(Debug, Default)]
pub struct TimeIndex {
    buckets: BTreeMap<ItemTime, Vec<ItemId>>,
}

impl TimeIndex {
    /// Appends `id` to the bucket for `time`, creating the bucket if needed.
    pub fn insert(&mut self, time: ItemTime, id: ItemId) {
        self.buckets.entry(time).or_default().push(id);
    }

    /// Removes `id` from the bucket for `time`.
    ///
    /// Returns `false` (and changes nothing) if the bucket does not exist or
    /// does not hold `id`.
    pub fn remove(&mut self, time: ItemTime, id: ItemId) -> bool {
        let Some(bucket) = self.buckets.get_mut(&time) else {
            return false;
        };
        let Some(pos) = bucket.iter().position(|&other| other == id) else {
            return false;
        };

        // `remove`, not `swap_remove`: bucket order is insertion order.
        bucket.remove(pos);
        if bucket.is_empty() {
            self.buckets.remove(&time);
        }
        true
    }

    #[cfg(test)]
    pub(crate) fn bucket(&self, time: ItemTime) -> Option<&[ItemId]> {
        self.buckets.get(&time).map(Vec::as_slice)
    }

    /// Iterates buckets from the most recent time to the oldest.
    pub fn buckets_desc(&self) -> impl Iterator<Item = (ItemTime, &[ItemId])> {
        self.buckets
            .iter()
            .rev()
            .map(|(time, ids)| (*time, ids.as_slice()))
    }
}
