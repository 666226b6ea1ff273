//! Broadcast bus for actions and lifecycle events.
//!
//! A [`Bus`] is an explicit, injected channel rather than a process-wide
//! singleton: components that dispatch hold a clone, components that consume
//! hold a [`BusReceiver`]. Values are delivered to every subscriber in
//! publish order; subscribers that fall behind the channel capacity observe
//! a [`tokio::sync::broadcast::error::RecvError::Lagged`] gap rather than
//! reordered values.

use tokio::sync::broadcast;

/// Default channel capacity. Generous for discrete UI-scale actions.
const DEFAULT_CAPACITY: usize = 64;

/// A single-producer-API, multi-consumer broadcast channel.
///
/// Cloning a `Bus` clones the sending side; all clones feed the same
/// subscribers.
#[derive(Debug, Clone)]
pub struct Bus<T> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> Bus<T> {
    /// Creates a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a bus that buffers up to `capacity` undelivered values per
    /// subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, matching the underlying channel.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes a value to all current subscribers.
    ///
    /// A dispatch with no live subscribers is dropped; that is normal during
    /// startup and teardown, so it is logged at trace level only.
    pub fn dispatch(&self, value: T) {
        if self.tx.send(value).is_err() {
            tracing::trace!("dispatch with no subscribers dropped");
        }
    }

    /// Subscribes to values published after this call.
    ///
    /// Subscribers receive values in publish order. A late subscriber does
    /// not see earlier values; replay-latest semantics belong to the data
    /// store's derived `watch` outputs, not to the bus.
    #[must_use]
    pub fn subscribe(&self) -> BusReceiver<T> {
        BusReceiver {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T: Clone + Send + 'static> Default for Bus<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of a [`Bus`] subscription.
#[derive(Debug)]
pub struct BusReceiver<T> {
    rx: broadcast::Receiver<T>,
}

impl<T: Clone + Send + 'static> BusReceiver<T> {
    /// Receives the next value, skipping over lag gaps.
    ///
    /// Returns `None` once every `Bus` clone has been dropped and the
    /// buffered values are exhausted.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "bus subscriber lagged; values dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receives without waiting. Returns `None` when no value is ready or
    /// the bus is closed.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.rx.try_recv() {
                Ok(value) => return Some(value),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "bus subscriber lagged; values dropped");
                }
                Err(_) => return None,
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivers_in_publish_order() {
        let bus: Bus<u32> = Bus::new();
        let mut rx = bus.subscribe();

        for value in 0..10 {
            bus.dispatch(value);
        }

        for expected in 0..10 {
            assert_eq!(rx.recv().await, Some(expected));
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_every_value() {
        let bus: Bus<&'static str> = Bus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.dispatch("a");
        bus.dispatch("b");

        assert_eq!(first.recv().await, Some("a"));
        assert_eq!(first.recv().await, Some("b"));
        assert_eq!(second.recv().await, Some("a"));
        assert_eq!(second.recv().await, Some("b"));
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_values() {
        let bus: Bus<u32> = Bus::new();
        let _keepalive = bus.subscribe();

        bus.dispatch(1);
        let mut late = bus.subscribe();
        bus.dispatch(2);

        assert_eq!(late.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_recv_none_after_all_senders_dropped() {
        let bus: Bus<u32> = Bus::new();
        let mut rx = bus.subscribe();
        bus.dispatch(7);
        drop(bus);

        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_try_recv_returns_only_ready_values() {
        let bus: Bus<u32> = Bus::new();
        let mut rx = bus.subscribe();

        assert_eq!(rx.try_recv(), None);

        bus.dispatch(1);
        bus.dispatch(2);
        assert_eq!(rx.try_recv(), Some(1));
        assert_eq!(rx.try_recv(), Some(2));
        assert_eq!(rx.try_recv(), None);

        drop(bus);
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_dispatch_without_subscribers_is_dropped() {
        let bus: Bus<u32> = Bus::new();
        // Must not panic or buffer.
        bus.dispatch(1);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
