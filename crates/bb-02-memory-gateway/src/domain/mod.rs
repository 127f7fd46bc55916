//! Domain layer for the Memory Gateway subsystem.

pub mod entities;
pub mod distance;

pub use distance::squared_l2;
pub use entities::{ContextLookup, Embedding, MemoryRecord, QueryResult, SearchHit};
