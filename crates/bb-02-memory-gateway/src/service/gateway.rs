//! Memory Gateway Service
//!
//! Orchestrates the embedding model, the vector index and the versioned
//! write history.

use async_trait::async_trait;
use bb_01_clock_merger::{KeyHistory, VersionedStore, WriteOutcome, WriteStamp};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{ContextLookup, Embedding, MemoryRecord, SearchHit};
use crate::error::MemoryError;
use crate::ports::{EmbeddingProvider, MemoryApi, VectorIndex};

/// Memory Gateway service.
///
/// Writes are serialized through an async mutex over the version store so
/// that the index always mirrors the current version of each key.
pub struct MemoryGateway {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    versions: Mutex<VersionedStore<MemoryRecord>>,
}

impl MemoryGateway {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            versions: Mutex::new(VersionedStore::new()),
        }
    }

    /// Embed `text`.
    ///
    /// # Errors
    ///
    /// `UpstreamUnavailable` or `EmptyEmbedding` from the provider.
    pub async fn embed(&self, text: &str) -> Result<Embedding, MemoryError> {
        let vector = self.embedder.embed(text).await?;
        if vector.is_empty() {
            return Err(MemoryError::EmptyEmbedding);
        }
        Ok(vector)
    }

    /// Write a pre-computed vector under `key`.
    ///
    /// The write is first reconciled against the key's history; the index is
    /// only updated when the incoming write becomes current. A failed index
    /// write rolls the history back, so nothing is recorded that search
    /// cannot see.
    ///
    /// # Errors
    ///
    /// - `EmptyEmbedding` / `DimensionMismatch` before any state changes
    /// - index errors from the upsert itself
    pub async fn upsert(
        &self,
        key: &str,
        vector: Embedding,
        text: &str,
        stamp: WriteStamp,
    ) -> Result<WriteOutcome, MemoryError> {
        if vector.is_empty() {
            return Err(MemoryError::EmptyEmbedding);
        }

        // Dimension is checked under the lock so two first writes cannot race
        let mut versions = self.versions.lock().await;
        if let Some(expected) = self.index.dimension().await? {
            if expected != vector.len() {
                return Err(MemoryError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }

        let before = versions.history(key).cloned();
        let record = MemoryRecord {
            text: text.to_string(),
            embedding: vector,
        };
        let outcome = versions.apply(key, stamp, record);

        if outcome.incoming_is_current() {
            if let Some(current) = versions.current(key) {
                let written = self
                    .index
                    .upsert(
                        vec![key.to_string()],
                        vec![current.value.embedding.clone()],
                        vec![current.value.text.clone()],
                    )
                    .await;
                if let Err(e) = written {
                    versions.restore(key, before);
                    warn!(key, error = %e, "Index write failed, version rolled back");
                    return Err(e);
                }
            }
        }

        match &outcome {
            WriteOutcome::Stale => debug!(key, "Stale memory write retained as history"),
            WriteOutcome::ConflictResolved { winner, loser, .. } => info!(
                key,
                winner = %winner.node_id,
                loser = %loser.node_id,
                "Concurrent memory writes resolved"
            ),
            _ => debug!(key, "Memory written"),
        }
        Ok(outcome)
    }

    /// Up to `k` nearest entries to `vector`.
    ///
    /// # Errors
    ///
    /// Index errors, including `DimensionMismatch`.
    pub async fn query(&self, vector: Embedding, k: usize) -> Result<Vec<SearchHit>, MemoryError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let result = self.index.query(vec![vector], k).await?;
        Ok(result.hits(0))
    }

    /// Retrieve context for `text`, degrading instead of failing.
    pub async fn search(&self, text: &str, k: usize) -> ContextLookup {
        let vector = match self.embed(text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = %e, "Memory search degraded: embedding failed");
                return ContextLookup::Unavailable {
                    reason: e.to_string(),
                };
            }
        };

        match self.query(vector, k).await {
            Ok(hits) if hits.is_empty() => ContextLookup::NoMatch,
            Ok(hits) => ContextLookup::Found(hits),
            Err(e) => {
                warn!(error = %e, "Memory search degraded: index query failed");
                ContextLookup::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Embed and write `text` under `key`.
    ///
    /// # Errors
    ///
    /// As [`MemoryGateway::embed`] and [`MemoryGateway::upsert`].
    pub async fn remember(
        &self,
        key: &str,
        text: &str,
        stamp: WriteStamp,
    ) -> Result<WriteOutcome, MemoryError> {
        let vector = self.embed(text).await?;
        self.upsert(key, vector, text, stamp).await
    }

    /// Current and superseded versions of `key`.
    pub async fn history(&self, key: &str) -> Option<KeyHistory<MemoryRecord>> {
        self.versions.lock().await.history(key).cloned()
    }
}

#[async_trait]
impl MemoryApi for MemoryGateway {
    async fn search(&self, text: &str, k: usize) -> ContextLookup {
        MemoryGateway::search(self, text, k).await
    }

    async fn remember(
        &self,
        key: &str,
        text: &str,
        stamp: WriteStamp,
    ) -> Result<WriteOutcome, MemoryError> {
        MemoryGateway::remember(self, key, text, stamp).await
    }
}
