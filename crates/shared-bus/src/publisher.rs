//! # Event Publisher
//!
//! Runtime side of the bus. Publishing is fire-and-forget: the runtime never
//! waits on an observer.

use crate::events::{BackboneEvent, EventFilter};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Sink for lifecycle events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `event`, returning how many subscribers it reached.
    async fn publish(&self, event: BackboneEvent) -> usize;
}

/// Broadcast bus kept in process memory.
///
/// A subscriber that falls more than [`DEFAULT_CHANNEL_CAPACITY`] events
/// behind loses the oldest ones.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<BackboneEvent>,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Observe every later event that `filter` accepts.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, "Lifecycle observer subscribed");
        Subscription::new(self.sender.subscribe(), filter)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: BackboneEvent) -> usize {
        let topic = event.topic();
        match self.sender.send(event) {
            Ok(receivers) => {
                trace!(?topic, receivers, "Lifecycle event published");
                receivers
            }
            // No observers attached
            Err(_) => 0,
        }
    }
}
