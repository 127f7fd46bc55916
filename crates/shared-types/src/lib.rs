//! # Shared Types Crate
//!
//! This crate contains the `Envelope` transport record, its value types, and
//! the sealing contract used by every subsystem of the backbone.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Envelope Integrity**: Every unit of work (user request, memory write,
//!   control message) travels wrapped in an `Envelope`.
//! - **Seal Once**: After `seal()` no field can change; a second seal is an
//!   error, not a no-op.
//! - **Causality over Wall Clock**: `timestamp` is informational; ordering
//!   decisions use the `VectorClock`.

pub mod clock;
pub mod entities;
pub mod envelope;
pub mod errors;
pub mod security;

pub use clock::VectorClock;
pub use entities::*;
pub use envelope::{Enrichment, Envelope};
pub use errors::*;
pub use security::{EnvelopeSigner, HmacSigner};
