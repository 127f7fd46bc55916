//! # Trace Ownership Table
//!
//! Guarantees that no two workers ever hold the same `trace_id`.
//!
//! ## Design
//!
//! - A trace id is claimed at enqueue and rejected while any entry exists
//! - Queued entries never expire; the queue bound already limits them
//! - In-flight and retired entries expire `ttl` after their last transition
//! - Expired entries are garbage-collected on access

use super::errors::DispatchError;
use super::Timestamp;
use shared_types::TraceId;
use std::collections::HashMap;

/// Where a claimed trace id is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipState {
    Queued,
    InFlight,
    Retired,
}

#[derive(Debug, Clone, Copy)]
struct Claim {
    state: OwnershipState,
    updated_at: Timestamp,
}

/// Time-bounded dedup table keyed by trace id.
#[derive(Debug)]
pub struct OwnershipTable {
    claims: HashMap<TraceId, Claim>,
    ttl_ms: u64,
}

impl OwnershipTable {
    #[must_use]
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            claims: HashMap::new(),
            ttl_ms,
        }
    }

    /// Claim `trace_id` for a newly queued envelope.
    ///
    /// # Errors
    ///
    /// `DispatchError::Duplicate` if the id is still owned.
    pub fn try_claim(&mut self, trace_id: &TraceId, now: Timestamp) -> Result<(), DispatchError> {
        self.garbage_collect(now);
        if self.claims.contains_key(trace_id) {
            return Err(DispatchError::Duplicate {
                trace_id: trace_id.clone(),
            });
        }
        self.claims.insert(
            trace_id.clone(),
            Claim {
                state: OwnershipState::Queued,
                updated_at: now,
            },
        );
        Ok(())
    }

    /// Undo a claim whose envelope never made it into a queue.
    pub fn release(&mut self, trace_id: &TraceId) {
        self.claims.remove(trace_id);
    }

    /// Mark a dequeued envelope as owned by a worker.
    pub fn mark_in_flight(&mut self, trace_id: &TraceId, now: Timestamp) {
        self.transition(trace_id, OwnershipState::InFlight, now);
    }

    /// Mark terminal. Returns false if the id was not owned.
    pub fn retire(&mut self, trace_id: &TraceId, now: Timestamp) -> bool {
        self.garbage_collect(now);
        self.transition(trace_id, OwnershipState::Retired, now)
    }

    /// Current state, if still owned.
    pub fn state(&mut self, trace_id: &TraceId, now: Timestamp) -> Option<OwnershipState> {
        self.garbage_collect(now);
        self.claims.get(trace_id).map(|c| c.state)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    fn transition(&mut self, trace_id: &TraceId, state: OwnershipState, now: Timestamp) -> bool {
        match self.claims.get_mut(trace_id) {
            Some(claim) => {
                claim.state = state;
                claim.updated_at = now;
                true
            }
            None => false,
        }
    }

    fn garbage_collect(&mut self, now: Timestamp) {
        let ttl = self.ttl_ms;
        self.claims.retain(|_, claim| {
            claim.state == OwnershipState::Queued || now.saturating_sub(claim.updated_at) < ttl
        });
    }
}
