//! # Event Subscriber
//!
//! Observer side of the bus. Lag is absorbed here so a slow observer only
//! ever misses events, it never errors.

use crate::events::{BackboneEvent, EventFilter};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

/// Filtered view of the bus held by one observer.
pub struct Subscription {
    receiver: broadcast::Receiver<BackboneEvent>,
    filter: EventFilter,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<BackboneEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// Next event the filter accepts, `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<BackboneEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "Lifecycle observer lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
