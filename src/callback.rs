//! Expiry callback — invoked once for each timer that fires.
//!
//! # Example
//! ```
//! use rotella::TimerWheelBuilder;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let fired = Arc::new(AtomicUsize::new(0));
//! let fired2 = Arc::clone(&fired);
//!
//! let wheel: rotella::TimerWheel<u64> =
//!     TimerWheelBuilder::new(Duration::from_millis(20), 8)
//!         .on_expire(move |_key, _value| {
//!             fired2.fetch_add(1, Ordering::Relaxed);
//!         })
//!         .build()
//!         .unwrap();
//!
//! wheel.schedule("job-1", 7, Duration::from_millis(60));
//! std::thread::sleep(Duration::from_millis(200));
//! assert_eq!(fired.load(Ordering::Relaxed), 1);
//! wheel.stop();
//! ```

/// A callback invoked when a scheduled key's deadline elapses.
///
/// Implementations must be `Send + Sync + 'static`: the callback is shared
/// across the dispatcher's worker threads via `Arc`.
///
/// The callback receives the key and the payload by value — the wheel gives
/// up ownership when the timer fires.  It runs on a dispatcher worker with
/// **no wheel lock held**, so it may freely call back into the wheel
/// (e.g. reschedule itself).  Callbacks for distinct keys may run in any
/// order.
pub trait ExpiryCallback<V>: Send + Sync + 'static {
    fn on_expire(&self, key: String, value: V);
}

/// An [`ExpiryCallback`] backed by a closure.
///
/// Created via [`TimerWheelBuilder::on_expire`](crate::TimerWheelBuilder::on_expire).
pub struct FnCallback<F>(pub F);

impl<V, F> ExpiryCallback<V> for FnCallback<F>
where
    F: Fn(String, V) + Send + Sync + 'static,
{
    fn on_expire(&self, key: String, value: V) {
        (self.0)(key, value)
    }
}
