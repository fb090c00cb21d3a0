//! Expiration fan-out.
//!
//! Expired entries are pushed onto an unbounded channel — the send never
//! blocks, so the tick engine and mutators may hand off while holding the
//! wheel lock — and a fixed pool of worker threads invokes the user callback.
//! No ordering is guaranteed across keys.  A panicking callback is caught
//! and logged; the worker keeps draining.

use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{error, warn};

use crate::callback::ExpiryCallback;

/// An expired `(key, value)` pair on its way to the user callback.
pub(crate) struct Expiration<V> {
    pub key: String,
    pub value: V,
}

/// Worker pool delivering expirations to the callback.
///
/// Dropping the dispatcher disconnects the channel; workers finish whatever
/// is already queued and exit.
pub(crate) struct Dispatcher<V> {
    tx: Sender<Expiration<V>>,
}

impl<V: Send + 'static> Dispatcher<V> {
    pub fn spawn(callback: Arc<dyn ExpiryCallback<V>>, workers: usize) -> io::Result<Self> {
        let (tx, rx) = unbounded::<Expiration<V>>();
        for id in 0..workers {
            let rx = rx.clone();
            let callback = Arc::clone(&callback);
            // Workers are detached: they exit when the channel disconnects.
            let _ = thread::Builder::new()
                .name(format!("rotella-expire-{id}"))
                .spawn(move || worker_loop(rx, callback))?;
        }
        Ok(Dispatcher { tx })
    }

    /// Hands an expiration to the pool.  Never blocks.
    pub fn dispatch(&self, expiration: Expiration<V>) {
        if self.tx.send(expiration).is_err() {
            // Only possible if every worker died at startup.
            warn!("expiry dispatch channel disconnected; dropping callback");
        }
    }
}

fn worker_loop<V: 'static>(rx: Receiver<Expiration<V>>, callback: Arc<dyn ExpiryCallback<V>>) {
    while let Ok(Expiration { key, value }) = rx.recv() {
        if catch_unwind(AssertUnwindSafe(|| callback.on_expire(key, value))).is_err() {
            error!("expiry callback panicked; worker continuing");
        }
    }
}
