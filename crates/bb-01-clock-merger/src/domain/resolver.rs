//! Deterministic resolution of concurrent writes.

use serde::{Deserialize, Serialize};
use shared_types::{Priority, VectorClock};
use std::cmp::Ordering;

/// Causal and ordering metadata attached to a single write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteStamp {
    pub node_id: String,
    pub clock: VectorClock,
    pub priority: Priority,
    /// Wall-clock seconds. Only consulted to break concurrent ties.
    pub timestamp: f64,
}

impl WriteStamp {
    #[must_use]
    pub fn new(
        node_id: impl Into<String>,
        clock: VectorClock,
        priority: Priority,
        timestamp: f64,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            clock,
            priority,
            timestamp,
        }
    }
}

/// Orders concurrent writes by priority (desc), timestamp (desc), then node
/// id (asc).
///
/// Stamps equal on all three fall back to comparing clock entries so the
/// ordering is total and both replicas pick the same winner.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// `Greater` means `a` wins over `b`.
    #[must_use]
    pub fn rank(&self, a: &WriteStamp, b: &WriteStamp) -> Ordering {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.timestamp.total_cmp(&b.timestamp))
            .then_with(|| b.node_id.cmp(&a.node_id))
            .then_with(|| a.clock.iter().cmp(b.clock.iter()))
    }

    /// True if `a` should win against `b`.
    #[must_use]
    pub fn prefers(&self, a: &WriteStamp, b: &WriteStamp) -> bool {
        self.rank(a, b) != Ordering::Less
    }
}
