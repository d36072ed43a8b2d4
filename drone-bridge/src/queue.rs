//! Bounded FIFO between message producers and the outbound worker.
//!
//! Producers (session transitions, telemetry callbacks on the client's
//! threads) call [`OutboundQueue::push`], which never waits.  When the queue
//! is full the oldest message is evicted, so a stalled consumer costs stale
//! updates rather than blocked callers.  Order among surviving messages is
//! preserved.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;

use crate::message::OutboundMessage;

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Shared handle to the outbound queue.
#[derive(Clone)]
pub struct OutboundQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    items: Mutex<VecDeque<OutboundMessage>>,
    capacity: usize,
    ready: Notify,
    // Metrics
    dropped: AtomicU64,
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(QueueInner {
                items: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                ready: Notify::new(),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Append `msg`, evicting the oldest message if the queue is full.
    pub fn push(&self, msg: OutboundMessage) {
        {
            let mut items = self.lock();
            if items.len() >= self.inner.capacity {
                items.pop_front();
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            }
            items.push_back(msg);
        }
        self.inner.ready.notify_one();
    }

    /// Take the oldest message without waiting.
    pub fn try_pop(&self) -> Option<OutboundMessage> {
        self.lock().pop_front()
    }

    /// Wait up to `wait` for a message.
    ///
    /// Cancel-safe: a message is only removed when it is returned.
    pub async fn pop_timeout(&self, wait: Duration) -> Option<OutboundMessage> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(msg) = self.try_pop() {
                return Some(msg);
            }
            if tokio::time::timeout_at(deadline, self.inner.ready.notified())
                .await
                .is_err()
            {
                return self.try_pop();
            }
        }
    }

    /// Remove and return everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<OutboundMessage> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Messages evicted because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<OutboundMessage>> {
        self.inner
            .items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for OutboundQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundQueue")
            .field("len", &self.len())
            .field("capacity", &self.inner.capacity)
            .field("dropped", &self.dropped())
            .finish()
    }
}
