//! # Memory Gateway Subsystem
//!
//! **Subsystem ID:** 2
//! **Status:** Production-Ready
//!
//! ## Purpose
//!
//! Turns text into embedding vectors, keeps a nearest-neighbour index of
//! remembered facts, and retrieves the closest facts to fold into a prompt
//! as context.
//!
//! ## Degradation
//!
//! Retrieval never fails a user request. When the embedding backend is
//! unreachable `search` reports `ContextLookup::Unavailable` and the caller
//! proceeds without context.
//!
//! ## Versioned Writes
//!
//! Every write carries a `WriteStamp`. Writes are routed through the clock
//! merger's `VersionedStore`; only the version that ends up current reaches
//! the index. Stale and conflict-losing writes are kept for audit via
//! `history`.
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/ - OllamaEmbeddingProvider, InMemoryVectorIndex       │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/inbound.rs  - MemoryApi                                  │
//! │  ports/outbound.rs - EmbeddingProvider, VectorIndex             │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  domain/  - MemoryRecord, SearchHit, ContextLookup, distance    │
//! │  service/ - MemoryGateway                                       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::{InMemoryVectorIndex, OllamaEmbeddingProvider};
pub use domain::{squared_l2, ContextLookup, Embedding, MemoryRecord, QueryResult, SearchHit};
pub use error::MemoryError;
pub use ports::{EmbeddingProvider, MemoryApi, VectorIndex};
pub use service::MemoryGateway;
