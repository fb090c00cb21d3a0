//! Hierarchical timing wheel core.
//!
//! ## Layout
//!
//! Three layers, each a ring of `S` buckets.  Layer `k` spans `B·Sᵏ` per
//! bucket, so with the defaults `B = 100 ms, S = 10`:
//!
//! | Layer | Bucket span | Full range |
//! |-------|-------------|------------|
//! | 0     | 100 ms      | 1 s        |
//! | 1     | 1 s         | 10 s       |
//! | 2     | 10 s        | 100 s      |
//!
//! Deadlines beyond the top layer's range park there with a `rounds`
//! counter — one unit per full top-layer revolution still owed.
//!
//! ## Placement
//!
//! A delay `d` is placed on the *coarsest* layer whose bucket span is `≤ d`:
//! `q = ⌊d / span⌋` layer ticks ahead, i.e. bucket `(cursor + q) mod S` with
//! `⌊q / S⌋` rounds.  Coarse placement minimizes how often an entry is
//! rewritten; precision is recovered on the way down (see demotion).
//! A delay shorter than the base span is not placeable and the caller fires
//! it immediately.
//!
//! ## Ticking
//!
//! Each base tick advances layer 0 by one slot and drains the bucket under
//! the new cursor.  A layer `k ≥ 1` advances exactly when layer `k−1`'s
//! cursor wrapped on this tick — odometer carries, computed from a snapshot
//! of the cursors taken before any advancement, so no layer ever moves more
//! than one slot per base tick.
//!
//! Draining a bucket visits each entry once:
//! - `rounds > 0` → decrement and leave in place;
//! - deadline still ahead → *demote*: re-place the residual delay, normally
//!   landing one layer finer (unplaceable residuals fire);
//! - deadline reached → fire.
//!
//! `rounds` is honored before the deadline check, so a wheel that falls
//! behind fires late rather than skipping owed revolutions.
//!
//! The core is a plain data structure driven by an explicit `now`; the
//! ticker thread in [`crate::timer`] owns the clock and the lock.

mod entry;
mod layer;

use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use tracing::{debug, trace};

use crate::dispatch::Expiration;
use crate::metrics::stats::StatsCounter;
use crate::wheel::entry::{Entry, Location};
use crate::wheel::layer::Layer;

/// Number of layers in the wheel.
pub(crate) const LAYER_COUNT: usize = 3;

/// A computed landing site for a delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Placement {
    layer: usize,
    slot: usize,
    rounds: u64,
}

// ---------------------------------------------------------------------------
// WheelCore
// ---------------------------------------------------------------------------

/// The wheel proper: layer stack plus key index.
///
/// All methods expect the caller to hold the wheel lock; mutation and tick
/// never run concurrently.  Expired entries are *returned*, not invoked —
/// handing them to the dispatcher is the caller's job, outside the lock.
pub(crate) struct WheelCore<V> {
    layers: [Layer<V>; LAYER_COUNT],
    /// key → current bucket coordinates, for O(1) cancel and reschedule.
    index: AHashMap<String, Location>,
    slots_per_layer: usize,
    stats: Arc<StatsCounter>,
}

impl<V> WheelCore<V> {
    pub fn new(base_interval: Duration, slots_per_layer: usize, stats: Arc<StatsCounter>) -> Self {
        let layers = std::array::from_fn(|k| {
            let interval = base_interval * (slots_per_layer as u32).pow(k as u32);
            Layer::new(interval, slots_per_layer)
        });
        WheelCore {
            layers,
            index: AHashMap::new(),
            slots_per_layer,
            stats,
        }
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Finds the coarsest layer whose bucket span fits within `delay`.
    ///
    /// Returns `None` when `delay` is below the base span — the entry cannot
    /// wait even one tick and must fire immediately.
    fn find_slot(&self, delay: Duration) -> Option<Placement> {
        let slots = self.slots_per_layer as u128;
        for (layer_idx, layer) in self.layers.iter().enumerate().rev() {
            if layer.interval <= delay {
                let q = delay.as_nanos() / layer.interval.as_nanos();
                let rounds = (q / slots).min(u64::MAX as u128) as u64;
                let slot = (layer.cursor + (q % slots) as usize) % self.slots_per_layer;
                return Some(Placement {
                    layer: layer_idx,
                    slot,
                    rounds,
                });
            }
        }
        None
    }

    fn install(&mut self, key: String, entry: Entry<V>, placement: Placement) {
        self.index.insert(
            key.clone(),
            Location {
                layer: placement.layer,
                slot: placement.slot,
            },
        );
        self.layers[placement.layer]
            .bucket_mut(placement.slot)
            .insert(key, entry);
    }

    fn remove(&mut self, key: &str) -> Option<(String, Entry<V>)> {
        let location = self.index.remove(key)?;
        self.layers[location.layer].bucket_mut(location.slot).remove(key)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Schedules `value` under `key`, replacing any prior entry for the key.
    ///
    /// A replaced entry is dropped silently — its callback never fires.
    /// Returns the expiration to dispatch when the delay is zero or below the
    /// base span (nothing is installed in that case).
    pub fn schedule(
        &mut self,
        key: String,
        value: V,
        delay: Duration,
        now: Instant,
    ) -> Option<Expiration<V>> {
        self.remove(&key);
        self.stats.record_scheduled();

        match self.find_slot(delay) {
            Some(placement) => {
                trace!(
                    key = %key,
                    layer = placement.layer,
                    slot = placement.slot,
                    rounds = placement.rounds,
                    "scheduled"
                );
                let entry = Entry {
                    value,
                    deadline: now + delay,
                    rounds: placement.rounds,
                };
                self.install(key, entry, placement);
                None
            }
            None => {
                self.stats.record_fired();
                Some(Expiration { key, value })
            }
        }
    }

    /// Reschedules an existing key; absent keys are left alone.
    ///
    /// Returns the expiration to dispatch when the new delay is not
    /// placeable (the entry is then removed).
    pub fn reschedule(&mut self, key: &str, delay: Duration, now: Instant) -> Option<Expiration<V>> {
        let (key, mut entry) = self.remove(key)?;

        match self.find_slot(delay) {
            Some(placement) => {
                entry.deadline = now + delay;
                entry.rounds = placement.rounds;
                self.install(key, entry, placement);
                None
            }
            None => {
                self.stats.record_fired();
                Some(Expiration {
                    key,
                    value: entry.value,
                })
            }
        }
    }

    /// Removes a scheduled key without firing its callback.
    ///
    /// Returns whether the key was present.
    pub fn cancel(&mut self, key: &str) -> bool {
        let removed = self.remove(key).is_some();
        if removed {
            self.stats.record_cancelled();
        }
        removed
    }

    /// Drops every scheduled entry.  No callbacks fire.
    pub fn clear(&mut self) {
        self.index.clear();
        for layer in &mut self.layers {
            layer.clear();
        }
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advances the wheel by one base tick and returns the expirations due.
    ///
    /// Carries are computed from a snapshot of the cursors taken before any
    /// advancement, so each layer moves at most one slot per call.
    pub fn tick(&mut self, now: Instant) -> Vec<Expiration<V>> {
        let prior: [usize; LAYER_COUNT] = std::array::from_fn(|k| self.layers[k].cursor);
        let mut fired = Vec::new();

        self.layers[0].advance();
        self.process_bucket(0, now, &mut fired);

        // Odometer carries: layer k advances only when layer k−1 wrapped on
        // this tick, which requires every layer below it to have wrapped too.
        for k in 1..LAYER_COUNT {
            if prior[k - 1] != self.slots_per_layer - 1 {
                break;
            }
            self.layers[k].advance();
            self.process_bucket(k, now, &mut fired);
        }

        if !fired.is_empty() {
            debug!(expired = fired.len(), "tick drained expired entries");
        }
        fired
    }

    /// Drains the bucket under `layer`'s cursor: waiting entries consume a
    /// round, live entries are demoted toward finer layers, due entries fire.
    fn process_bucket(&mut self, layer: usize, now: Instant, fired: &mut Vec<Expiration<V>>) {
        let cursor = self.layers[layer].cursor;
        let drained = self.layers[layer].bucket_mut(cursor).take_all();
        if drained.is_empty() {
            return;
        }

        let mut waiting = Vec::new();
        for (key, mut entry) in drained {
            if entry.rounds > 0 {
                entry.rounds -= 1;
                waiting.push((key, entry));
                continue;
            }

            if entry.deadline > now {
                let residual = entry.deadline - now;
                match self.find_slot(residual) {
                    Some(placement) => {
                        entry.rounds = placement.rounds;
                        self.stats.record_demotion();
                        self.install(key, entry, placement);
                    }
                    None => {
                        // Residual below one base span: next tick would be
                        // past the deadline, so fire now.
                        self.index.remove(&key);
                        self.stats.record_fired();
                        fired.push(Expiration {
                            key,
                            value: entry.value,
                        });
                    }
                }
            } else {
                self.index.remove(&key);
                self.stats.record_fired();
                fired.push(Expiration {
                    key,
                    value: entry.value,
                });
            }
        }

        // Entries that only consumed a round stay in this bucket; their
        // recorded location is unchanged.
        self.layers[layer].bucket_mut(cursor).extend(waiting);
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
