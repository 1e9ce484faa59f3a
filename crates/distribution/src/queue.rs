use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

/// A bounded, single-consumer queue that drops the oldest entry instead of
/// blocking the producer when full (spec §4.F: "On queue full, drop-oldest
/// and increment `dropped`"). This is what lets distributor `send` stay
/// fire-and-forget from the orchestrator's point of view (spec §4.G).
pub struct DropOldestQueue<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
    notify: Notify,
}

impl<T> DropOldestQueue<T> {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self { inner: Mutex::new(VecDeque::with_capacity(capacity)), capacity, notify: Notify::new() })
    }

    /// Pushes one item, returning `true` if an older item was dropped to
    /// make room.
    pub fn push(&self, item: T) -> bool {
        let dropped = {
            let mut guard = self.inner.lock();
            let dropped = if guard.len() >= self.capacity {
                guard.pop_front();
                true
            } else {
                false
            };
            guard.push_back(item);
            dropped
        };
        self.notify.notify_one();
        dropped
    }

    /// Drains every currently-queued item in FIFO order (the order
    /// guarantee of spec §5 applies to this drain, not to the underlying
    /// transport).
    pub fn drain(&self) -> Vec<T> {
        let mut guard = self.inner.lock();
        guard.drain(..).collect()
    }

    pub async fn wait_for_items(&self) {
        self.notify.notified().await;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_oldest_when_over_capacity() {
        let queue: Arc<DropOldestQueue<u32>> = DropOldestQueue::new(4);
        for i in 0..10 {
            let _ = queue.push(i);
        }
        let drained = queue.drain();
        assert_eq!(drained, vec![6, 7, 8, 9]);
    }
}
