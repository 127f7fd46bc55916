//! Dispatcher configuration.

use super::errors::DispatchError;
use shared_types::Region;
use std::collections::BTreeSet;
use std::time::Duration;

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Maximum queued envelopes per region.
    pub queue_bound: usize,
    /// Wait after which an envelope gains one priority tier.
    pub aging_threshold: Duration,
    /// Lifetime of in-flight and retired ownership entries.
    pub ownership_ttl: Duration,
    /// Regions with a worker pool on this node.
    pub regions: BTreeSet<Region>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_bound: 1024,
            aging_threshold: Duration::from_secs(5),
            ownership_ttl: Duration::from_secs(300),
            regions: BTreeSet::from([Region::Local]),
        }
    }
}

impl DispatcherConfig {
    /// Reject configurations the dispatcher cannot run with.
    ///
    /// # Errors
    ///
    /// `DispatchError::InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.queue_bound == 0 {
            return Err(DispatchError::InvalidConfig(
                "queue_bound must be at least 1".into(),
            ));
        }
        if self.aging_threshold.is_zero() {
            return Err(DispatchError::InvalidConfig(
                "aging_threshold must be non-zero".into(),
            ));
        }
        if self.regions.is_empty() {
            return Err(DispatchError::InvalidConfig(
                "at least one region must be served".into(),
            ));
        }
        Ok(())
    }
}
