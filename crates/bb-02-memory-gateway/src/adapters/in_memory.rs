//! In-process vector index.
//!
//! Exhaustive scan with squared-Euclidean distance. Entries keep the order
//! of their first insertion; re-upserting an id replaces its content in
//! place, so distance ties always resolve to the earliest-inserted id.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::domain::{squared_l2, Embedding, QueryResult};
use crate::error::MemoryError;
use crate::ports::VectorIndex;

#[derive(Debug)]
struct Entry {
    id: String,
    embedding: Embedding,
    document: String,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<Entry>,
    positions: HashMap<String, usize>,
    dimension: Option<usize>,
}

impl Inner {
    fn check_dimension(&self, actual: usize) -> Result<(), MemoryError> {
        match self.dimension {
            Some(expected) if expected != actual => {
                Err(MemoryError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }
}

/// Vector index held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    inner: RwLock<Inner>,
}

impl InMemoryVectorIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(
        &self,
        ids: Vec<String>,
        embeddings: Vec<Embedding>,
        documents: Vec<String>,
    ) -> Result<(), MemoryError> {
        if ids.len() != embeddings.len() || ids.len() != documents.len() {
            return Err(MemoryError::BatchShape {
                ids: ids.len(),
                embeddings: embeddings.len(),
                documents: documents.len(),
            });
        }

        let mut inner = self.inner.write();

        // Validate the whole batch before touching anything
        let dimension = inner
            .dimension
            .or_else(|| embeddings.first().map(Vec::len));
        for embedding in &embeddings {
            if embedding.is_empty() {
                return Err(MemoryError::EmptyEmbedding);
            }
            if let Some(expected) = dimension {
                if embedding.len() != expected {
                    return Err(MemoryError::DimensionMismatch {
                        expected,
                        actual: embedding.len(),
                    });
                }
            }
        }
        inner.dimension = dimension;

        for ((id, embedding), document) in ids.into_iter().zip(embeddings).zip(documents) {
            match inner.positions.get(&id).copied() {
                Some(pos) => {
                    let entry = &mut inner.entries[pos];
                    entry.embedding = embedding;
                    entry.document = document;
                }
                None => {
                    let pos = inner.entries.len();
                    inner.positions.insert(id.clone(), pos);
                    inner.entries.push(Entry {
                        id,
                        embedding,
                        document,
                    });
                }
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        query_embeddings: Vec<Embedding>,
        n_results: usize,
    ) -> Result<QueryResult, MemoryError> {
        let inner = self.inner.read();
        let mut result = QueryResult::default();

        for query in &query_embeddings {
            inner.check_dimension(query.len())?;

            let mut scored: Vec<(f32, &Entry)> = inner
                .entries
                .iter()
                .map(|entry| (squared_l2(query, &entry.embedding), entry))
                .collect();
            // Stable: equal distances keep insertion order
            scored.sort_by(|a, b| a.0.total_cmp(&b.0));
            scored.truncate(n_results);

            result.ids.push(scored.iter().map(|(_, e)| e.id.clone()).collect());
            result
                .documents
                .push(scored.iter().map(|(_, e)| e.document.clone()).collect());
            result.distances.push(scored.iter().map(|(d, _)| *d).collect());
        }
        Ok(result)
    }

    async fn dimension(&self) -> Result<Option<usize>, MemoryError> {
        Ok(self.inner.read().dimension)
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.inner.read().entries.len())
    }
}
