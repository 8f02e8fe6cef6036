//! Depth-bucketed set of components waiting for a re-render.
//!
//! Each bucket holds a pending count per component. A component lives in the
//! bucket matching its depth and is pending for as long as its count is above
//! zero. Buckets are visited root-most first so an ancestor always renders
//! before any of its descendants in the same pass. Inside a bucket components
//! are visited in the order they were first queued.

use std::hash::Hash;

use crate::collections::map::{self, IndexMap};
use crate::composer::{ComposerId, Depth};

pub struct UpdateManager<K = ComposerId> {
    pending: Vec<Option<IndexMap<K, usize>>>, // index = depth, allocated on first use
}

impl<K> Default for UpdateManager<K> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> UpdateManager<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `key` for an update at `depth`, raising its pending count.
    pub fn add(&mut self, key: K, depth: Depth) {
        if self.pending.len() <= depth {
            self.pending.resize_with(depth + 1, || None);
        }
        let bucket = self.pending[depth].get_or_insert_with(map::ordered);
        *bucket.entry(key).or_insert(0) += 1;
    }

    /// Marks one update of `key` as rendered. The entry disappears once its
    /// count reaches zero; unknown entries are ignored.
    pub fn done(&mut self, key: K, depth: Depth) {
        let Some(bucket) = self.bucket_mut(depth) else {
            return;
        };
        let Some(count) = bucket.get_mut(&key) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            bucket.shift_remove(&key);
        }
    }

    /// Drops `key` regardless of its count. Returns the count it had.
    pub fn forget(&mut self, key: K, depth: Depth) -> usize {
        self.bucket_mut(depth)
            .and_then(|bucket| bucket.shift_remove(&key))
            .unwrap_or(0)
    }

    pub fn pending_count(&self, key: K, depth: Depth) -> usize {
        self.bucket(depth)
            .and_then(|bucket| bucket.get(&key).copied())
            .unwrap_or(0)
    }

    pub fn contains(&self, key: K, depth: Depth) -> bool {
        self.pending_count(key, depth) > 0
    }

    /// Visits every pending component once, shallowest depth first, then in
    /// queueing order inside a depth.
    pub fn for_each(&self, mut visit: impl FnMut(K, Depth)) {
        for (depth, bucket) in self.pending.iter().enumerate() {
            let Some(bucket) = bucket else {
                continue;
            };
            for key in bucket.keys() {
                visit(*key, depth);
            }
        }
    }

    /// Snapshot of the components pending at `depth`.
    pub fn pending_at(&self, depth: Depth) -> Vec<K> {
        self.bucket(depth)
            .map(|bucket| bucket.keys().copied().collect())
            .unwrap_or_default()
    }

    /// First depth at or below `from` that has pending components.
    pub fn next_depth(&self, from: Depth) -> Option<Depth> {
        self.pending
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, bucket)| bucket.as_ref().is_some_and(|bucket| !bucket.is_empty()))
            .map(|(depth, _)| depth)
    }

    /// Number of distinct pending components.
    pub fn len(&self) -> usize {
        self.pending.iter().flatten().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.iter().flatten().all(|bucket| bucket.is_empty())
    }

    pub fn clear(&mut self) {
        for bucket in self.pending.iter_mut().flatten() {
            bucket.clear();
        }
    }

    fn bucket(&self, depth: Depth) -> Option<&IndexMap<K, usize>> {
        self.pending.get(depth).and_then(Option::as_ref)
    }

    fn bucket_mut(&mut self, depth: Depth) -> Option<&mut IndexMap<K, usize>> {
        self.pending.get_mut(depth).and_then(Option::as_mut)
    }
}
