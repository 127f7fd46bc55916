//! # Inbound Port - MemoryApi
//!
//! Primary driving port used by the runtime's ingress and workers.

use async_trait::async_trait;
use bb_01_clock_merger::{WriteOutcome, WriteStamp};

use crate::domain::ContextLookup;
use crate::error::MemoryError;

/// Retrieval and write API of the Memory Gateway.
#[async_trait]
pub trait MemoryApi: Send + Sync {
    /// Retrieve up to `k` facts nearest to `text`.
    ///
    /// Never fails: backend problems surface as
    /// `ContextLookup::Unavailable`.
    async fn search(&self, text: &str, k: usize) -> ContextLookup;

    /// Embed `text` and write it under `key`.
    ///
    /// # Errors
    ///
    /// Embedding or index failures. The versioned history is left
    /// untouched when the embedding step fails.
    async fn remember(
        &self,
        key: &str,
        text: &str,
        stamp: WriteStamp,
    ) -> Result<WriteOutcome, MemoryError>;
}
