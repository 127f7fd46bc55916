//! Error types for the Stream Relay subsystem

use super::state::RelayState;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Generation backend unreachable or failed mid-stream.
    #[error("Generation backend unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    /// No first token within the configured bound.
    #[error("No token received within {after_ms}ms")]
    FirstTokenTimeout { after_ms: u64 },

    /// Backend closed the stream without a done marker.
    #[error("Generation stream ended without a done marker")]
    Truncated,

    /// Backend sent a line that is not a generation record.
    #[error("Malformed generation record: {0}")]
    Protocol(String),

    /// Envelope payload carries no prompt.
    #[error("Envelope payload of kind {kind} has no prompt")]
    MissingPrompt { kind: &'static str },

    #[error("Invalid relay transition {from:?} -> {to:?}")]
    InvalidTransition { from: RelayState, to: RelayState },
}
