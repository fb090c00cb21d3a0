use std::time::Instant;

/// The `(layer, slot)` coordinates of a live entry.
///
/// Held by the key index so that cancel and reschedule reach the owning
/// bucket in O(1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Location {
    pub layer: usize,
    pub slot: usize,
}

/// A scheduled timer.
///
/// The bucket map owns the entry and is keyed by the timer's key, so the key
/// and location are not duplicated here — the index and the bucket cannot
/// disagree about where an entry lives.
pub(crate) struct Entry<V> {
    pub value: V,
    /// Absolute monotonic instant at which the callback should fire.
    pub deadline: Instant,
    /// Full revolutions of the current layer to wait before this entry is
    /// re-examined.
    pub rounds: u64,
}
