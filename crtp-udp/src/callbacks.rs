//! Ordered subscriber lists for link and lifecycle events.
//!
//! A [`Caller`] holds typed closures for one event kind.  Subscribers run in
//! registration order.  A subscriber that panics is caught and logged; the
//! remaining subscribers still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard};

type Subscriber<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Subscriber list for events carrying a `T`.
pub struct Caller<T> {
    subscribers: Mutex<Vec<Subscriber<T>>>,
}

impl<T> Default for Caller<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Caller<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Append a subscriber.
    pub fn add_callback<F>(&self, callback: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.lock().push(Box::new(callback));
    }

    /// Drop every registered subscriber.
    pub fn remove_all(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every subscriber with `event`.
    ///
    /// Returns the number of subscribers that panicked.
    ///
    /// The list stays locked for the duration of the call, so a subscriber
    /// must not register new subscribers on the same `Caller`.
    pub fn call(&self, event: &T) -> usize {
        let subscribers = self.lock();
        let mut failed = 0;
        for (idx, subscriber) in subscribers.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| subscriber(event))).is_err() {
                log::error!("[callbacks] subscriber #{idx} panicked; continuing");
                failed += 1;
            }
        }
        failed
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber<T>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> std::fmt::Debug for Caller<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caller")
            .field("subscribers", &self.len())
            .finish()
    }
}
