use std::time::Duration;

use ahash::AHashMap;

use crate::wheel::entry::Entry;

// ---------------------------------------------------------------------------
// Bucket
// ---------------------------------------------------------------------------

/// One slot of a layer's ring: an unordered key → entry map.
///
/// A map (rather than a plain list) keeps keyed removal O(1), which cancel
/// and reschedule rely on.
pub(crate) struct Bucket<V> {
    entries: AHashMap<String, Entry<V>>,
}

impl<V> Bucket<V> {
    fn new() -> Self {
        Bucket {
            entries: AHashMap::new(),
        }
    }

    pub fn insert(&mut self, key: String, entry: Entry<V>) {
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: &str) -> Option<(String, Entry<V>)> {
        self.entries.remove_entry(key)
    }

    /// Takes every entry out of the bucket, leaving it empty.
    ///
    /// Tick processing drains the bucket this way so surviving entries can be
    /// reinserted (here or in a finer layer) without aliasing the ring.
    pub fn take_all(&mut self) -> AHashMap<String, Entry<V>> {
        std::mem::take(&mut self.entries)
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = (String, Entry<V>)>) {
        self.entries.extend(entries);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

// ---------------------------------------------------------------------------
// Layer
// ---------------------------------------------------------------------------

/// One ring of the wheel: `S` buckets, each spanning `interval`.
///
/// The cursor is advanced only by the tick path — once per tick for the base
/// layer, once per full revolution of the next-finer layer above it.
pub(crate) struct Layer<V> {
    pub interval: Duration,
    pub cursor: usize,
    buckets: Vec<Bucket<V>>,
}

impl<V> Layer<V> {
    pub fn new(interval: Duration, slots: usize) -> Self {
        Layer {
            interval,
            cursor: 0,
            buckets: (0..slots).map(|_| Bucket::new()).collect(),
        }
    }

    /// Moves the cursor one slot forward, wrapping at the ring's end.
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.buckets.len();
    }

    pub fn bucket_mut(&mut self, slot: usize) -> &mut Bucket<V> {
        &mut self.buckets[slot]
    }

    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    /// Total entries across all buckets of this layer.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }

    #[cfg(test)]
    pub fn bucket(&self, slot: usize) -> &Bucket<V> {
        &self.buckets[slot]
    }
}
