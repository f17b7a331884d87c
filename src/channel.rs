//! Message-passing primitives between the engine and external actors.
//!
//! Two flavors: [`MessageChannel`], a FIFO queue whose `recv` awaits until an
//! item arrives, used for prompts, responses, and broadcasts; and
//! [`PhaseChannel`], a single-slot last-write-wins mailbox used to hand a
//! whole phase's result to an external coordinator.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

/// FIFO multi-item channel. `send` never blocks; `recv` awaits an item.
#[derive(Debug)]
pub struct MessageChannel<T> {
    queue: Mutex<VecDeque<T>>,
    notify: Notify,
}

// Manual impl: the derive would demand `T: Default` even though an empty
// channel never holds a `T`.
impl<T> Default for MessageChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MessageChannel<T> {
    /// Creates an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Enqueues an item and wakes one waiting receiver.
    pub fn send(&self, item: T) {
        self.lock().push_back(item);
        self.notify.notify_one();
    }

    /// Awaits the next item.
    pub async fn recv(&self) -> T {
        loop {
            if let Some(item) = self.try_recv() {
                return item;
            }
            self.notify.notified().await;
        }
    }

    /// Dequeues the next item without waiting.
    pub fn try_recv(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Whether any item is queued.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.lock().is_empty()
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns every queued item, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.lock().drain(..).collect()
    }

    /// Discards every queued item.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
        // Queue operations never panic while holding the lock.
        self.queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Single-slot mailbox: `send` overwrites, `take` is non-blocking and may
/// find nothing.
#[derive(Debug)]
pub struct PhaseChannel<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for PhaseChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PhaseChannel<T> {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Stores an item, replacing whatever was there.
    pub fn send(&self, item: T) {
        *self.lock() = Some(item);
    }

    /// Removes and returns the current item, if any.
    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    /// Whether the slot holds an item.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.lock().is_some()
    }

    /// Empties the slot.
    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<T: Clone> PhaseChannel<T> {
    /// Returns a copy of the current item without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<T> {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn message_channel_is_fifo() {
        let channel = MessageChannel::new();
        channel.send(1);
        channel.send(2);
        channel.send(3);
        assert_eq!(channel.try_recv(), Some(1));
        assert_eq!(channel.drain(), vec![2, 3]);
        assert_eq!(channel.try_recv(), None);
    }

    #[test]
    fn has_pending_and_clear() {
        let channel = MessageChannel::new();
        assert!(!channel.has_pending());
        channel.send("x");
        assert!(channel.has_pending());
        assert_eq!(channel.len(), 1);
        channel.clear();
        assert!(channel.is_empty());
    }

    #[tokio::test]
    async fn recv_awaits_a_sender() {
        let channel = Arc::new(MessageChannel::new());
        let sender = Arc::clone(&channel);
        let task = tokio::spawn(async move { channel.recv().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        sender.send(42);
        assert_eq!(task.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn recv_returns_queued_item_immediately() {
        let channel = MessageChannel::new();
        channel.send(7);
        assert_eq!(channel.recv().await, 7);
    }

    #[test]
    fn default_works_for_non_default_item_types() {
        struct Opaque;
        let channel: MessageChannel<Opaque> = MessageChannel::default();
        assert!(channel.is_empty());
        let slot: PhaseChannel<Opaque> = PhaseChannel::default();
        assert!(!slot.is_set());
    }

    #[test]
    fn phase_channel_last_write_wins() {
        let channel = PhaseChannel::new();
        channel.send("first");
        channel.send("second");
        assert_eq!(channel.peek(), Some("second"));
        assert_eq!(channel.take(), Some("second"));
        assert_eq!(channel.take(), None);
    }

    #[test]
    fn phase_channel_clear_resets() {
        let channel = PhaseChannel::new();
        channel.send(1);
        assert!(channel.is_set());
        channel.clear();
        assert!(!channel.is_set());
    }
}
