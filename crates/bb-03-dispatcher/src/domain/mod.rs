//! Domain layer for the Dispatcher subsystem.

pub mod config;
pub mod errors;
pub mod ownership;
pub mod queue;

pub use config::DispatcherConfig;
pub use errors::DispatchError;
pub use ownership::{OwnershipState, OwnershipTable};
pub use queue::{effective_tier, QueuedEnvelope, RegionQueue};

use serde::Serialize;
use shared_types::Region;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Snapshot of one region's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionStatus {
    pub region: Region,
    pub depth: usize,
    /// Wait of the oldest queued envelope, 0 when empty.
    pub oldest_wait_ms: u64,
}

/// Snapshot of the whole dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatcherStatus {
    pub regions: Vec<RegionStatus>,
    pub owned_traces: usize,
    pub queue_bound: usize,
    pub shut_down: bool,
}
