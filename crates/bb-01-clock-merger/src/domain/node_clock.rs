//! Per-node clock state.

use super::causality::{merge, tick};
use parking_lot::Mutex;
use shared_types::VectorClock;

/// The clock a single node owns.
///
/// Only this type advances the node's own entry. Remote clocks are folded
/// in with [`NodeClock::observe`], which never ticks.
#[derive(Debug)]
pub struct NodeClock {
    node_id: String,
    clock: Mutex<VectorClock>,
}

impl NodeClock {
    #[must_use]
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            clock: Mutex::new(VectorClock::new()),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Record one local event and return the resulting clock.
    pub fn tick(&self) -> VectorClock {
        let mut clock = self.clock.lock();
        *clock = tick(&clock, &self.node_id);
        clock.clone()
    }

    /// Merge a clock received from another node.
    pub fn observe(&self, remote: &VectorClock) {
        let mut clock = self.clock.lock();
        *clock = merge(&clock, remote);
    }

    /// Read-only copy of the current clock.
    #[must_use]
    pub fn snapshot(&self) -> VectorClock {
        self.clock.lock().clone()
    }
}
