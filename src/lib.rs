//! # tick-store
//!
//! An ordered map from a continuous `f64` coordinate ("tick") to arbitrary
//! values, with duplicate ticks allowed. Entries are additionally partitioned
//! into integer-aligned buckets (`floor(tick)`) so that "what exists near this
//! tick" queries resolve without scanning the whole map.
//!
//! ## Example
//!
//! ```rust
//! use tick_store::TickStore;
//!
//! let mut store: TickStore<&str> = TickStore::new();
//! store.add(3.000, "Event 1");
//! store.add(3.142, "Event 2");
//! store.add(4.900, "Event 3");
//! store.add(1.421, "Event 4");
//!
//! assert_eq!(store.get(3.000), Some(&"Event 1"));
//! assert_eq!(store.item(1), Some(&"Event 1"));
//! assert_eq!(store.item(0), Some(&"Event 4")); // sorted on tick value
//! assert_eq!(store.get_bucket_items(3.0), vec![&"Event 1", &"Event 2"]);
//! ```
//!
//! Ticks are compared with ordinary numeric equality for exact lookups and
//! with [`f64::total_cmp`] for ordering, so a NaN tick cannot corrupt the
//! sorted invariants (it orders after `+inf`) but will never match `get` or
//! `remove`. Bucketing of non-finite ticks is unspecified.

#![forbid(unsafe_code)]

use smallvec::{smallvec, SmallVec};
use std::cmp::Ordering;
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;

// =============================================================================
// Bucket keys and search helpers
// =============================================================================

/// Most buckets hold only a handful of entries; keep them inline.
const BUCKET_INLINE: usize = 4;

#[inline]
fn bucket_key(tick: f64) -> i64 {
    tick.floor() as i64
}

/// Right-biased insertion position: first index whose element orders strictly
/// after `tick`, i.e. after all elements equal to it.
#[inline]
fn upper_bound(seq: &[f64], tick: f64) -> usize {
    seq.partition_point(|t| t.total_cmp(&tick) != Ordering::Greater)
}

/// First index whose element does not order strictly before `tick`.
#[inline]
fn lower_bound(seq: &[f64], tick: f64) -> usize {
    seq.partition_point(|t| t.total_cmp(&tick) == Ordering::Less)
}

// =============================================================================
// Entries and buckets
// =============================================================================

#[derive(Clone, Debug)]
struct Entry<V> {
    tick: f64,
    value: V,
}

type Bucket<V> = SmallVec<[Entry<V>; BUCKET_INLINE]>;

// =============================================================================
// TickStore
// =============================================================================

/// Ordered tick-to-value map with integer bucket partitioning.
///
/// Three coordinated structures back the container:
/// - `tick_seq`: every tick currently present, ascending, duplicates allowed.
///   Drives ordinal access and `len`.
/// - `bucket_keys`: the distinct keys of non-empty buckets, ascending.
/// - `buckets`: bucket key to the entries whose tick floors to it, ascending
///   by tick within each bucket.
///
/// Duplicate ticks keep insertion order among themselves (insertion is
/// right-biased), and `get` returns the earliest-inserted among equals.
#[derive(Clone)]
pub struct TickStore<V> {
    tick_seq: Vec<f64>,
    bucket_keys: Vec<i64>,
    buckets: HashMap<i64, Bucket<V>>,
}

impl<V> TickStore<V> {
    pub fn new() -> Self {
        Self {
            tick_seq: Vec::new(),
            bucket_keys: Vec::new(),
            buckets: HashMap::new(),
        }
    }

    /// Total entry count.
    #[inline]
    pub fn len(&self) -> usize {
        self.tick_seq.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tick_seq.is_empty()
    }

    /// Number of populated buckets.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.bucket_keys.len()
    }

    pub fn shrink_to_fit(&mut self) {
        self.tick_seq.shrink_to_fit();
        self.bucket_keys.shrink_to_fit();
        self.buckets.shrink_to_fit();
        for bucket in self.buckets.values_mut() {
            bucket.shrink_to_fit();
        }
    }

    /// Insert an entry. Never fails and never rejects duplicates: the same
    /// tick may appear any number of times.
    ///
    /// Appending in non-decreasing tick order is O(1) amortized; out-of-order
    /// insertion pays a binary search plus the element shift of the backing
    /// sequences. The append fast path is taken independently for the global
    /// sequence, the bucket key list, and the target bucket.
    pub fn add(&mut self, tick: f64, value: V) {
        match self.tick_seq.last() {
            Some(last) if tick.total_cmp(last) == Ordering::Less => {
                let at = upper_bound(&self.tick_seq, tick);
                self.tick_seq.insert(at, tick);
            }
            _ => self.tick_seq.push(tick),
        }

        let key = bucket_key(tick);
        let entry = Entry { tick, value };
        match self.buckets.entry(key) {
            MapEntry::Vacant(slot) => {
                match self.bucket_keys.last() {
                    Some(&last) if key < last => {
                        let at = self.bucket_keys.partition_point(|k| *k <= key);
                        self.bucket_keys.insert(at, key);
                    }
                    _ => self.bucket_keys.push(key),
                }
                slot.insert(smallvec![entry]);
            }
            MapEntry::Occupied(slot) => {
                let bucket = slot.into_mut();
                match bucket.last() {
                    Some(last) if tick.total_cmp(&last.tick) == Ordering::Less => {
                        let at = bucket
                            .partition_point(|e| e.tick.total_cmp(&tick) != Ordering::Greater);
                        bucket.insert(at, entry);
                    }
                    _ => bucket.push(entry),
                }
            }
        }
    }

    /// Remove exactly one entry matching both `tick` (exact numeric equality)
    /// and `value`.
    ///
    /// Returns `true` if an entry was found and removed, `false` otherwise
    /// (with no side effects). When a bucket empties its key is dropped from
    /// the bucket key list as well.
    pub fn remove(&mut self, tick: f64, value: &V) -> bool
    where
        V: PartialEq,
    {
        let key = bucket_key(tick);
        let Some(bucket) = self.buckets.get_mut(&key) else {
            return false;
        };
        let Some(at) = bucket
            .iter()
            .position(|e| e.tick == tick && e.value == *value)
        else {
            return false;
        };

        // The stored tick may differ from the argument under the total order
        // even when `==` matched (-0.0 vs 0.0); both structures must drop the
        // same representative or their orderings desynchronize.
        let removed_tick = bucket[at].tick;

        if bucket.len() == 1 {
            self.buckets.remove(&key);
            if let Ok(key_at) = self.bucket_keys.binary_search(&key) {
                self.bucket_keys.remove(key_at);
            }
        } else {
            bucket.remove(at);
        }

        // First occurrence ordering equal to the removed entry's tick;
        // guaranteed present since the bucket held it.
        if let Some(seq_at) = self
            .tick_seq
            .iter()
            .position(|t| t.total_cmp(&removed_tick) == Ordering::Equal)
        {
            self.tick_seq.remove(seq_at);
        }
        true
    }

    /// Retrieve a value by exact tick.
    ///
    /// When multiple entries share the tick, returns the earliest-inserted
    /// among them.
    pub fn get(&self, tick: f64) -> Option<&V> {
        let bucket = self.buckets.get(&bucket_key(tick))?;
        bucket.iter().find(|e| e.tick == tick).map(|e| &e.value)
    }

    /// Retrieve a value by zero-based ordinal index into the sorted tick
    /// sequence. Out of range yields `None`.
    pub fn item(&self, index: usize) -> Option<&V> {
        let &tick = self.tick_seq.get(index)?;
        self.get(tick)
    }

    /// Like [`item`](Self::item), but clamps `index` to the valid range, so
    /// indices beyond the end return the last item. `None` only on an empty
    /// store.
    pub fn last_item(&self, index: usize) -> Option<&V> {
        if self.tick_seq.is_empty() {
            return None;
        }
        let at = index.min(self.tick_seq.len() - 1);
        self.get(self.tick_seq[at])
    }

    /// Nearest-preceding lookup over the global tick sequence: the value at
    /// the greatest stored tick `<= tick`.
    ///
    /// When `tick` precedes every stored tick the first entry's value is
    /// returned. `None` on an empty store.
    pub fn last_item_by_time(&self, tick: f64) -> Option<&V> {
        let seq = &self.tick_seq;
        let mut at = upper_bound(seq, tick);
        if at != 0 && (at == seq.len() || seq[at].total_cmp(&tick) == Ordering::Greater) {
            at -= 1;
        }
        self.get(*seq.get(at)?)
    }

    /// Resolve the exact i-th entry in global order, including which
    /// duplicate among equal ticks, as a `(tick, value)` pair.
    pub fn entry_at(&self, index: usize) -> Option<(f64, &V)> {
        let &tick = self.tick_seq.get(index)?;
        let bucket = self.buckets.get(&bucket_key(tick))?;
        // Equal ticks are contiguous in both sequences and share a bucket, so
        // the offset past the first equal tick carries over.
        let offset = index - lower_bound(&self.tick_seq, tick);
        let first = bucket.partition_point(|e| e.tick.total_cmp(&tick) == Ordering::Less);
        bucket.get(first + offset).map(|e| (e.tick, &e.value))
    }

    /// The bucket key at a zero-based ordinal into the populated bucket list.
    pub fn bucket_at(&self, index: usize) -> Option<i64> {
        self.bucket_keys.get(index).copied()
    }

    /// The would-be insertion position (right-biased) of `floor(tick)` within
    /// the populated bucket keys, whether or not such a bucket exists. Always
    /// in `0..=bucket_count`.
    pub fn bucket_index_for(&self, tick: f64) -> usize {
        let key = bucket_key(tick);
        self.bucket_keys.partition_point(|k| *k <= key)
    }

    /// Index of the populated bucket whose key is the greatest key
    /// `<= floor(tick)`. Returns 0 on an empty store (no bucket exists; the
    /// caller must check `bucket_count`).
    pub fn last_bucket_index_for(&self, tick: f64) -> usize {
        let mut at = self.bucket_index_for(tick);
        let covered = self
            .bucket_keys
            .get(at)
            .and_then(|key| self.buckets.get(key))
            .is_some_and(|bucket| bucket[0].tick <= tick);
        if at != 0 && !covered {
            at -= 1;
        }
        at
    }

    /// All values in the bucket for `floor(tick)` in ascending tick order, or
    /// an empty `Vec` if no such bucket exists.
    pub fn get_bucket_items(&self, tick: f64) -> Vec<&V> {
        match self.buckets.get(&bucket_key(tick)) {
            Some(bucket) => bucket.iter().map(|e| &e.value).collect(),
            None => Vec::new(),
        }
    }

    /// A fresh cursor over all `(tick, value)` pairs in bucket-major order:
    /// ascending bucket key, then ascending tick within the bucket. For
    /// integer floor keys this coincides with global tick order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            store: self,
            bucket: 0,
            pos: 0,
        }
    }
}

impl<V> Default for TickStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for TickStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Convenience view over [`entry_at`](TickStore::entry_at): `store[i]` is the
/// value of the i-th entry in sorted order. Panics when out of range, like
/// slice indexing.
impl<V> std::ops::Index<usize> for TickStore<V> {
    type Output = V;

    fn index(&self, index: usize) -> &V {
        match self.entry_at(index) {
            Some((_, value)) => value,
            None => panic!(
                "index out of bounds: the len is {} but the index is {}",
                self.len(),
                index
            ),
        }
    }
}

// =============================================================================
// Iteration
// =============================================================================

pub struct Iter<'a, V> {
    store: &'a TickStore<V>,
    bucket: usize,
    pos: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (f64, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.store.bucket_keys.get(self.bucket)?;
        let bucket = &self.store.buckets[key];
        let entry = &bucket[self.pos];
        self.pos += 1;
        if self.pos == bucket.len() {
            self.pos = 0;
            self.bucket += 1;
        }
        Some((entry.tick, &entry.value))
    }
}

impl<'a, V> IntoIterator for &'a TickStore<V> {
    type Item = (f64, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
