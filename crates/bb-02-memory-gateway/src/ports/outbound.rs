//! Outbound Ports (Driven Ports)
//!
//! Dependencies the gateway needs from an embedding model and a vector
//! collection.

use async_trait::async_trait;

use crate::domain::{Embedding, QueryResult};
use crate::error::MemoryError;

/// Text-to-vector model (Driven Port).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text`.
    ///
    /// # Errors
    ///
    /// - `UpstreamUnavailable` when the model cannot be reached
    /// - `EmptyEmbedding` when it answers with no vector
    async fn embed(&self, text: &str) -> Result<Embedding, MemoryError>;
}

/// Nearest-neighbour collection (Driven Port).
///
/// Batched, parallel-array shape: the `n`th id, embedding and document
/// describe the same entry.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace entries by id.
    async fn upsert(
        &self,
        ids: Vec<String>,
        embeddings: Vec<Embedding>,
        documents: Vec<String>,
    ) -> Result<(), MemoryError>;

    /// Up to `n_results` nearest entries per query embedding, ascending by
    /// distance.
    async fn query(
        &self,
        query_embeddings: Vec<Embedding>,
        n_results: usize,
    ) -> Result<QueryResult, MemoryError>;

    /// Vector length fixed by the first insert, `None` while empty.
    async fn dimension(&self) -> Result<Option<usize>, MemoryError>;

    async fn count(&self) -> Result<usize, MemoryError>;
}
