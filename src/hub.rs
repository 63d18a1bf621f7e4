//! Hub (C7, §4.7): a minimal bounded pub/sub primitive with four overflow
//! strategies. Not part of the interesting design — a straightforward
//! wrapper subscribers use to get an independent lazy sequence of events
//! from the point they subscribed.

use tokio::sync::{broadcast, mpsc};

/// How a [`Hub`] behaves when a publish would exceed a subscriber's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowStrategy {
    /// No bound; the buffer grows to hold every unconsumed message.
    Unbounded,
    /// Bounded to `cap`; a new message evicts the oldest unconsumed one.
    Sliding(usize),
    /// Bounded to `cap`; a new message is dropped if the buffer is full.
    Dropping(usize),
    /// Bounded to `cap`; `publish` blocks until a subscriber makes room.
    Backpressure(usize),
}

/// A bounded pub/sub topic for values of type `T`. Each subscriber gets an
/// independent queue starting from the point it subscribed; `Unbounded` and
/// `Sliding`/`Dropping` are backed by a `tokio::sync::broadcast` channel
/// (which already drops the oldest unread message per-lagging-subscriber on
/// overflow, matching `Sliding` directly; `Dropping` and `Backpressure`
/// additionally gate `publish` itself).
pub struct Hub<T> {
    strategy: OverflowStrategy,
    tx: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> Hub<T> {
    #[must_use]
    pub fn new(strategy: OverflowStrategy) -> Self {
        let capacity = match strategy {
            OverflowStrategy::Unbounded => usize::MAX.min(1 << 20),
            OverflowStrategy::Sliding(cap) | OverflowStrategy::Dropping(cap) | OverflowStrategy::Backpressure(cap) => {
                cap.max(1)
            }
        };
        let (tx, _) = broadcast::channel(capacity);
        Self { strategy, tx }
    }

    /// A fresh subscription; sees only messages published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    /// Publishes `value` to every current subscriber, honoring the
    /// strategy's overflow behavior. For `Dropping`, a publish that would
    /// exceed capacity (no subscribers to receive it, or all lagging
    /// maximally) is silently discarded. For `Backpressure`, this method
    /// blocks until at least one subscriber slot is free.
    pub async fn publish(&self, value: T) {
        match self.strategy {
            OverflowStrategy::Backpressure(cap) => {
                while self.tx.len() >= cap && self.tx.receiver_count() > 0 {
                    tokio::task::yield_now().await;
                }
                let _ = self.tx.send(value);
            }
            OverflowStrategy::Dropping(cap) => {
                if self.tx.len() < cap || self.tx.receiver_count() == 0 {
                    let _ = self.tx.send(value);
                }
            }
            OverflowStrategy::Unbounded | OverflowStrategy::Sliding(_) => {
                let _ = self.tx.send(value);
            }
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A point-to-point alternative used internally where exactly one consumer
/// drains a queue (the mock transport's reconcile request table uses this
/// shape directly rather than through `Hub`).
pub fn channel<T>(capacity: usize) -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(capacity.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_sees_messages_published_after_subscribe() {
        let hub = Hub::new(OverflowStrategy::Unbounded);
        let mut rx = hub.subscribe();
        hub.publish(1).await;
        hub.publish(2).await;
        assert_eq!(rx.recv().await.unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_messages() {
        let hub = Hub::new(OverflowStrategy::Unbounded);
        hub.publish(1).await;
        let mut rx = hub.subscribe();
        hub.publish(2).await;
        assert_eq!(rx.recv().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn dropping_strategy_discards_when_no_subscribers_and_at_capacity() {
        let hub: Hub<i32> = Hub::new(OverflowStrategy::Dropping(2));
        // No subscribers: receiver_count() == 0, so every publish still sends
        // (nothing to overflow against) but nothing panics or blocks.
        hub.publish(1).await;
        hub.publish(2).await;
        hub.publish(3).await;
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_every_message() {
        let hub = Hub::new(OverflowStrategy::Unbounded);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        hub.publish("x").await;
        assert_eq!(a.recv().await.unwrap(), "x");
        assert_eq!(b.recv().await.unwrap(), "x");
    }

    #[tokio::test]
    async fn subscriber_count_reflects_active_subscriptions() {
        let hub: Hub<i32> = Hub::new(OverflowStrategy::Unbounded);
        assert_eq!(hub.subscriber_count(), 0);
        let _rx = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
    }
}
