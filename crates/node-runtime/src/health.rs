//! Health probe.

use serde::Serialize;

use bb_03_dispatcher::DispatcherStatus;

use crate::container::BackboneContainer;

/// Answer of the node's health probe.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// `active`, or `shutting_down` once shutdown has begun.
    pub status: &'static str,
    /// Generation model in use.
    pub model: String,
    pub node_id: String,
    pub dispatcher: DispatcherStatus,
}

impl HealthStatus {
    #[must_use]
    pub fn probe(container: &BackboneContainer) -> Self {
        let dispatcher = container.dispatcher.status();
        Self {
            status: if dispatcher.shut_down {
                "shutting_down"
            } else {
                "active"
            },
            model: container.config.backend.generation_model.clone(),
            node_id: container.config.node.node_id.clone(),
            dispatcher,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}
