//! Ports Layer
//!
//! - Driving port (inbound): `MemoryApi`
//! - Driven ports (outbound): `EmbeddingProvider`, `VectorIndex`

pub mod inbound;
pub mod outbound;

pub use inbound::MemoryApi;
pub use outbound::{EmbeddingProvider, VectorIndex};
