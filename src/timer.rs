use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use parking_lot::Mutex;

use crate::builder::{BuildError, TimerWheelBuilder};
use crate::callback::ExpiryCallback;
use crate::dispatch::Dispatcher;
use crate::metrics::stats::{Metrics, StatsCounter};
use crate::wheel::WheelCore;

// ---------------------------------------------------------------------------
// Wheel interior
// ---------------------------------------------------------------------------

/// Shared interior of a [`TimerWheel`].
pub(crate) struct Inner<V> {
    /// One lock guards layers, buckets and the key index as a unit; every
    /// mutation and every tick holds it for its full critical section.
    core: Mutex<WheelCore<V>>,
    dispatcher: Dispatcher<V>,
    stats: Arc<StatsCounter>,
    /// Quit-signal sender for the ticker thread.  `None` once stopped;
    /// dropping the sender disconnects the channel and halts the ticker.
    quit: Mutex<Option<Sender<()>>>,
}

impl<V: Send + 'static> Inner<V> {
    fn tick_once(&self) {
        // The lock guard is released before dispatching: fired is collected
        // first, then handed off.
        let fired = self.core.lock().tick(Instant::now());
        for expiration in fired {
            self.dispatcher.dispatch(expiration);
        }
    }
}

// ---------------------------------------------------------------------------
// Tick engine
// ---------------------------------------------------------------------------

/// Ticker thread body: one wheel tick per base interval until stopped.
///
/// Holds only a weak reference to the interior, so dropping the last wheel
/// handle tears the engine down even without an explicit `stop()`.
fn ticker_loop<V: Send + 'static>(inner: Weak<Inner<V>>, quit: Receiver<()>, base: Duration) {
    let ticks = tick(base);
    loop {
        select! {
            recv(ticks) -> _ => {
                let Some(inner) = inner.upgrade() else { return };
                inner.tick_once();
            }
            // Fires on an explicit signal and on disconnect alike.
            recv(quit) -> _ => return,
        }
    }
}

// ---------------------------------------------------------------------------
// TimerWheel handle
// ---------------------------------------------------------------------------

/// A hierarchical timing wheel with a background tick engine.
///
/// Keys are strings; payloads are an arbitrary `Send` type handed back to
/// the expiry callback when the deadline elapses.  Scheduling, rescheduling
/// and cancellation are all O(1) in the number of live timers.
///
/// The handle is cheaply cloneable; all clones drive the same wheel.
///
/// # Example
/// ```
/// use rotella::TimerWheelBuilder;
/// use std::time::Duration;
///
/// let wheel: rotella::TimerWheel<u64> =
///     TimerWheelBuilder::new(Duration::from_millis(50), 10)
///         .on_expire(|key, value| { let _ = (key, value); })
///         .build()
///         .unwrap();
///
/// wheel.schedule("session-42", 7, Duration::from_millis(150));
/// assert!(wheel.contains("session-42"));
/// wheel.cancel("session-42");
/// wheel.stop();
/// ```
pub struct TimerWheel<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for TimerWheel<V> {
    fn clone(&self) -> Self {
        TimerWheel {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> std::fmt::Debug for TimerWheel<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerWheel").finish_non_exhaustive()
    }
}

impl<V: Send + 'static> TimerWheel<V> {
    /// Assembles the interior and spawns the dispatcher and ticker threads.
    ///
    /// Parameters are validated by [`TimerWheelBuilder::build`].
    pub(crate) fn start(
        base_interval: Duration,
        slots_per_layer: usize,
        dispatch_workers: usize,
        callback: Arc<dyn ExpiryCallback<V>>,
    ) -> Result<Self, BuildError> {
        let stats = Arc::new(StatsCounter::new());
        let dispatcher = Dispatcher::spawn(callback, dispatch_workers)?;
        let inner = Arc::new(Inner {
            core: Mutex::new(WheelCore::new(
                base_interval,
                slots_per_layer,
                Arc::clone(&stats),
            )),
            dispatcher,
            stats,
            quit: Mutex::new(None),
        });

        let (quit_tx, quit_rx) = bounded(1);
        let weak = Arc::downgrade(&inner);
        // The ticker is detached: it exits on quit-channel disconnect or
        // when the interior is gone.
        let _ = thread::Builder::new()
            .name("rotella-ticker".to_string())
            .spawn(move || ticker_loop(weak, quit_rx, base_interval))?;
        *inner.quit.lock() = Some(quit_tx);

        Ok(TimerWheel { inner })
    }

    /// Returns a [`TimerWheelBuilder`] for constructing a new wheel.
    pub fn builder(base_interval: Duration, slots_per_layer: usize) -> TimerWheelBuilder<V> {
        TimerWheelBuilder::new(base_interval, slots_per_layer)
    }

    // -----------------------------------------------------------------------
    // Scheduling operations
    // -----------------------------------------------------------------------

    /// Schedules `value` to expire under `key` after `delay`.
    ///
    /// Reusing a key replaces the prior timer; the replaced payload is
    /// dropped without firing.  A `delay` below the base interval cannot
    /// wait even one tick and fires immediately (through the dispatcher,
    /// like any other expiration).
    pub fn schedule(&self, key: impl Into<String>, value: V, delay: Duration) {
        let fired = self
            .inner
            .core
            .lock()
            .schedule(key.into(), value, delay, Instant::now());
        if let Some(expiration) = fired {
            self.inner.dispatcher.dispatch(expiration);
        }
    }

    /// Moves an existing key's deadline to `delay` from now.
    ///
    /// Unknown keys are ignored — this reschedules, it never creates.  An
    /// unplaceable `delay` fires the entry immediately.
    pub fn reschedule(&self, key: &str, delay: Duration) {
        let fired = self.inner.core.lock().reschedule(key, delay, Instant::now());
        if let Some(expiration) = fired {
            self.inner.dispatcher.dispatch(expiration);
        }
    }

    /// Cancels the timer for `key` without firing its callback.
    ///
    /// Returns `true` if a live timer was removed.  Cancellation is
    /// deterministic as long as it happens before the expiration is handed
    /// to the dispatcher; once handed off, the callback will run.
    pub fn cancel(&self, key: &str) -> bool {
        self.inner.core.lock().cancel(key)
    }

    /// Removes every scheduled timer.  No callbacks fire.
    pub fn clear(&self) {
        self.inner.core.lock().clear();
    }

    /// Halts the tick engine.
    ///
    /// Entries still scheduled are abandoned (they will never fire), and
    /// callbacks already handed to the dispatcher are neither cancelled nor
    /// awaited.  Stopping twice is a no-op.
    pub fn stop(&self) {
        // Dropping the sender disconnects the quit channel.
        self.inner.quit.lock().take();
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Number of currently scheduled timers.
    pub fn len(&self) -> usize {
        self.inner.core.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if a timer is scheduled under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.core.lock().contains(key)
    }

    pub fn stats(&self) -> Metrics {
        self.inner.stats.snapshot()
    }
}
