use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::callback::{ExpiryCallback, FnCallback};
use crate::timer::TimerWheel;

/// Default number of dispatcher worker threads.
const DEFAULT_DISPATCH_WORKERS: usize = 4;

/// Why a wheel could not be constructed.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("base interval must be non-zero")]
    ZeroBaseInterval,
    #[error("slots per layer must be at least 2 (got {0})")]
    TooFewSlots(usize),
    #[error("an expiry callback must be registered before build()")]
    MissingCallback,
    #[error("failed to spawn a wheel thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Builder for configuring and constructing a [`TimerWheel`].
///
/// # Example
/// ```
/// use rotella::TimerWheelBuilder;
/// use std::time::Duration;
///
/// let wheel: rotella::TimerWheel<String> =
///     TimerWheelBuilder::new(Duration::from_millis(100), 10)
///         .on_expire(|key, _value| println!("{key} expired"))
///         .build()
///         .unwrap();
/// wheel.stop();
/// ```
pub struct TimerWheelBuilder<V> {
    base_interval: Duration,
    slots_per_layer: usize,
    dispatch_workers: usize,
    callback: Option<Arc<dyn ExpiryCallback<V>>>,
}

impl<V: 'static> TimerWheelBuilder<V> {
    /// Starts a builder for a wheel ticking every `base_interval` with
    /// `slots_per_layer` buckets per layer.
    ///
    /// The three layers cover `base_interval` × `slots_per_layer`ᵏ per
    /// bucket for k = 0, 1, 2.  Invalid parameters are reported by
    /// [`build`](Self::build), not here.
    pub fn new(base_interval: Duration, slots_per_layer: usize) -> Self {
        TimerWheelBuilder {
            base_interval,
            slots_per_layer,
            dispatch_workers: DEFAULT_DISPATCH_WORKERS,
            callback: None,
        }
    }

    /// Sets the number of dispatcher worker threads (default: 4).
    pub fn dispatch_workers(mut self, n: usize) -> Self {
        assert!(n > 0, "dispatch_workers must be greater than 0");
        self.dispatch_workers = n;
        self
    }

    /// Registers the expiry callback as a closure.
    ///
    /// The closure runs on a dispatcher worker thread with no wheel lock
    /// held; it may call back into the wheel.
    pub fn on_expire<F>(mut self, f: F) -> Self
    where
        F: Fn(String, V) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(FnCallback(f)));
        self
    }

    /// Registers the expiry callback via the [`ExpiryCallback`] trait.
    pub fn on_expire_impl<C: ExpiryCallback<V>>(mut self, callback: C) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }
}

impl<V: Send + 'static> TimerWheelBuilder<V> {
    /// Validates the configuration, spawns the dispatcher workers and the
    /// tick engine, and returns the running wheel.
    pub fn build(self) -> Result<TimerWheel<V>, BuildError> {
        if self.base_interval.is_zero() {
            return Err(BuildError::ZeroBaseInterval);
        }
        if self.slots_per_layer < 2 {
            return Err(BuildError::TooFewSlots(self.slots_per_layer));
        }
        let callback = self.callback.ok_or(BuildError::MissingCallback)?;
        TimerWheel::start(
            self.base_interval,
            self.slots_per_layer,
            self.dispatch_workers,
            callback,
        )
    }
}
