//! Error types for the Memory Gateway subsystem

use thiserror::Error;

/// Errors from embedding, indexing and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Embedding or index backend could not be reached or answered badly.
    #[error("Memory backend unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    /// Backend answered with an empty vector.
    #[error("Embedding backend returned an empty vector")]
    EmptyEmbedding,

    /// Vector length differs from the index dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Parallel batch arrays have different lengths.
    #[error("Batch shape mismatch: {ids} ids, {embeddings} embeddings, {documents} documents")]
    BatchShape {
        ids: usize,
        embeddings: usize,
        documents: usize,
    },
}

impl MemoryError {
    pub(crate) fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self::UpstreamUnavailable {
            reason: reason.to_string(),
        }
    }
}
