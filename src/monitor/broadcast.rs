//! Best-effort fan-out of normalized events to live subscribers.
//!
//! Each subscriber gets its own bounded MPSC queue. Delivery never blocks the
//! ingestion path beyond a fixed timeout: a subscriber that cannot accept an
//! update in time has that update dropped for it alone (at-most-once). Loss
//! here is acceptable because persistence has already captured the event.

use std::time::Duration;

use tokio::sync::{Mutex, mpsc};

use crate::events::MonitorUpdate;

/// Default size for each subscriber's queue.
const DEFAULT_BUFFER_SIZE: usize = 256;

/// Longest a single subscriber may stall delivery before its copy of the
/// update is dropped.
const SEND_TIMEOUT: Duration = Duration::from_millis(100);

pub struct BroadcastBus {
    subscribers: Mutex<Vec<mpsc::Sender<MonitorUpdate>>>,
}

impl BroadcastBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a subscriber and returns the receiver its updates arrive on.
    /// Subscribers may be added at any time without pausing ingestion; there
    /// is no registration limit.
    pub async fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<MonitorUpdate> {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let (tx, rx) = mpsc::channel(size);
        self.subscribers.lock().await.push(tx);
        rx
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// Delivers the update to every registered subscriber. Senders are cloned
    /// out of the lock so a slow subscriber never blocks registration;
    /// subscribers whose receiver has gone away are pruned afterwards.
    pub async fn broadcast(&self, update: MonitorUpdate) {
        let senders = { self.subscribers.lock().await.clone() };

        let mut any_closed = false;
        for sender in senders {
            match sender.send_timeout(update.clone(), SEND_TIMEOUT).await {
                Ok(()) => {}
                Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                    tracing::warn!(
                        target: "vigil::broadcast",
                        "Subscriber queue full after {:?}, dropping {} update for it",
                        SEND_TIMEOUT,
                        update.category
                    );
                }
                Err(mpsc::error::SendTimeoutError::Closed(_)) => {
                    any_closed = true;
                }
            }
        }

        if any_closed {
            self.subscribers.lock().await.retain(|tx| !tx.is_closed());
        }
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::events::{EventCategory, NormalizedEvent, ReactionRecord};

    fn update(text: &str) -> MonitorUpdate {
        MonitorUpdate {
            category: EventCategory::Reactions,
            event: NormalizedEvent::Reaction(ReactionRecord {
                message_id: 1,
                chat_id: 2,
                user_id: 3,
                user_username: None,
                reaction: text.to_string(),
                action: "added".to_string(),
                date: chrono::Utc::now(),
            }),
            display: text.to_string(),
            conversation_kind: None,
        }
    }

    #[tokio::test]
    async fn test_all_subscribers_receive_updates() {
        let bus = BroadcastBus::new();
        let mut rx1 = bus.subscribe(Some(4)).await;
        let mut rx2 = bus.subscribe(Some(4)).await;

        bus.broadcast(update("hello")).await;

        assert_eq!(rx1.recv().await.unwrap().display, "hello");
        assert_eq!(rx2.recv().await.unwrap().display, "hello");
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_fast_subscriber_receives() {
        let bus = BroadcastBus::new();
        let mut slow = bus.subscribe(Some(1)).await;
        let mut fast = bus.subscribe(Some(8)).await;

        // Fill the slow subscriber's queue; it never reads.
        bus.broadcast(update("first")).await;

        let started = Instant::now();
        bus.broadcast(update("second")).await;
        let elapsed = started.elapsed();

        // Bounded by the send timeout, not by the slow subscriber.
        assert!(elapsed < Duration::from_secs(1), "broadcast stalled: {elapsed:?}");

        assert_eq!(fast.recv().await.unwrap().display, "first");
        assert_eq!(fast.recv().await.unwrap().display, "second");

        // The slow subscriber only ever got the first update.
        assert_eq!(slow.recv().await.unwrap().display, "first");
        assert!(slow.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_subscribers_are_pruned() {
        let bus = BroadcastBus::new();
        let rx = bus.subscribe(Some(4)).await;
        let mut live = bus.subscribe(Some(4)).await;
        drop(rx);

        bus.broadcast(update("ping")).await;

        assert_eq!(bus.subscriber_count().await, 1);
        assert_eq!(live.recv().await.unwrap().display, "ping");
    }
}
