//! # Error Types
//!
//! Validation and sealing errors shared across subsystems. Both families are
//! local, synchronous, and non-retryable.

use crate::entities::TraceId;
use thiserror::Error;

/// Malformed envelope input, rejected before it enters the system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Priority outside `0..=10`.
    #[error("Priority {value} out of range [0, 10]")]
    PriorityOutOfRange { value: i64 },

    /// A required payload field is blank.
    #[error("Payload field '{0}' is missing or blank")]
    MissingField(&'static str),

    /// Trace id is empty, too long, or contains whitespace.
    #[error("Invalid trace id: {0:?}")]
    InvalidTraceId(String),

    /// Region name outside the closed enumeration.
    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    /// Retrieved context can only be attached to generation payloads.
    #[error("Context cannot be attached to a {kind} payload")]
    ContextNotApplicable { kind: &'static str },
}

/// Errors from envelope lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Mutation attempted after sealing.
    #[error("Envelope {trace_id} is sealed and cannot be modified")]
    Sealed { trace_id: TraceId },

    /// Second `seal()` call. Re-signing is rejected, never idempotent.
    #[error("Envelope {trace_id} is already sealed")]
    AlreadySealed { trace_id: TraceId },

    /// Canonical serialization failed.
    #[error("Canonical serialization failed: {0}")]
    Serialization(String),
}

impl EnvelopeError {
    /// True for the two "sealed data" rejections.
    #[must_use]
    pub fn is_seal_violation(&self) -> bool {
        matches!(self, Self::Sealed { .. } | Self::AlreadySealed { .. })
    }
}
