//! A small typed pub/sub event bus for cross-cutting operational events
//! (e.g. PBX connection-status changes, dialer stats snapshots) that more
//! than one component wants to observe without a direct dependency edge.
//!
//! A typed publish/subscribe bus backed by `tokio::sync::broadcast`.
//! Deliberately small: no sharding, no priority lanes, no external
//! transport -- just enough for components in this workspace to observe
//! each other's events without a direct dependency edge.

use tokio::sync::broadcast;

/// A named, cloneable event bus for a single payload type `T`. Clone to
/// share a handle; every clone publishes to and subscribes from the same
/// underlying channel.
#[derive(Clone)]
pub struct EventBus<T: Clone + Send + 'static> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> EventBus<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Returns the number of active subscribers that
    /// received it; `Ok(0)` is not an error, it just means nobody's
    /// listening right now.
    pub fn publish(&self, event: T) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct ConnectionStatusChanged {
        connected: bool,
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus: EventBus<ConnectionStatusChanged> = EventBus::new(8);
        let mut subscriber = bus.subscribe();

        let delivered = bus.publish(ConnectionStatusChanged { connected: true });
        assert_eq!(delivered, 1);

        let received = subscriber.recv().await.unwrap();
        assert_eq!(received, ConnectionStatusChanged { connected: true });
    }

    #[tokio::test]
    async fn publishing_with_no_subscribers_is_not_an_error() {
        let bus: EventBus<ConnectionStatusChanged> = EventBus::new(8);
        assert_eq!(bus.publish(ConnectionStatusChanged { connected: false }), 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_a_copy() {
        let bus: EventBus<ConnectionStatusChanged> = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(ConnectionStatusChanged { connected: true });

        assert_eq!(a.recv().await.unwrap().connected, true);
        assert_eq!(b.recv().await.unwrap().connected, true);
        assert_eq!(bus.subscriber_count(), 2);
    }
}
