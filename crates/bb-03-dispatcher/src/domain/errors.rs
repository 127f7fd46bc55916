//! Dispatcher error types.

use shared_types::{Region, TraceId};
use thiserror::Error;

/// Errors from dispatcher operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No worker pool for this region on this node. Never re-routed.
    #[error("Region {region} is not served by this node")]
    RegionNotServed { region: Region },

    /// Only sealed envelopes may be dispatched.
    #[error("Envelope {trace_id} is not sealed")]
    NotSealed { trace_id: TraceId },

    /// Backpressure: caller must retry or drop.
    #[error("Queue for {region} is full ({depth}/{bound})")]
    QueueOverflow {
        region: Region,
        depth: usize,
        bound: usize,
    },

    /// The trace id is already owned.
    #[error("Trace {trace_id} is already dispatched")]
    Duplicate { trace_id: TraceId },

    /// Dispatcher has been shut down.
    #[error("Dispatcher is shut down")]
    ShutDown,

    #[error("Invalid dispatcher configuration: {0}")]
    InvalidConfig(String),
}

impl DispatchError {
    /// True for errors a caller may retry later.
    #[must_use]
    pub fn is_backpressure(&self) -> bool {
        matches!(self, Self::QueueOverflow { .. })
    }
}
