use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};

use super::notification::Notification;

#[derive(Debug, PartialEq)]
pub enum PushOutcome {
    Queued,
    /// The queue was full; the oldest non-critical item made room.
    DroppedOldest(Notification),
    /// The queue was full of critical items; the incoming one was not queued.
    Rejected(Notification),
    Closed(Notification),
}

#[derive(Debug, Default)]
struct QueueInner {
    items: VecDeque<Notification>,
    closed: bool,
}

/// Bounded FIFO between producers and the dispatch worker.
#[derive(Debug)]
pub struct DispatchQueue {
    inner: Mutex<QueueInner>,
    capacity: usize,
    ready: Notify,
}

impl DispatchQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            capacity: capacity.max(1),
            ready: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn push(&self, notification: Notification) -> PushOutcome {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return PushOutcome::Closed(notification);
        }

        let mut outcome = PushOutcome::Queued;
        if inner.items.len() >= self.capacity {
            let oldest_non_critical = inner.items.iter().position(|item| !item.is_critical());
            match oldest_non_critical {
                Some(index) => {
                    if let Some(dropped) = inner.items.remove(index) {
                        outcome = PushOutcome::DroppedOldest(dropped);
                    }
                }
                None => return PushOutcome::Rejected(notification),
            }
        }

        inner.items.push_back(notification);
        drop(inner);
        self.ready.notify_one();
        outcome
    }

    /// Waits for the next item. Returns `None` once the queue is closed and
    /// drained.
    pub async fn pop(&self) -> Option<Notification> {
        loop {
            let ready = self.ready.notified();
            {
                let mut inner = self.inner.lock().await;
                if let Some(item) = inner.items.pop_front() {
                    return Some(item);
                }
                if inner.closed {
                    return None;
                }
            }
            ready.await;
        }
    }

    pub async fn close(&self) {
        self.inner.lock().await.closed = true;
        self.ready.notify_one();
    }

    /// Removes everything still queued, oldest first.
    pub async fn drain_remaining(&self) -> Vec<Notification> {
        self.inner.lock().await.items.drain(..).collect()
    }
}
