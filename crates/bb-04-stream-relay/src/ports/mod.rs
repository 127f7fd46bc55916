//! Ports for the Stream Relay subsystem.

pub mod outbound;

pub use outbound::{GenerationBackend, GenerationChunk, GenerationRequest, TokenSource};
