//! Memory domain entities.

use serde::{Deserialize, Serialize};

/// Fixed-length vector of floats. Length is constant within one index.
pub type Embedding = Vec<f32>;

/// Value stored per logical memory key in the versioned store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub text: String,
    pub embedding: Embedding,
}

/// One nearest-neighbour result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub document: String,
    pub distance: f32,
}

/// Batched query response. Outer index follows the query batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub ids: Vec<Vec<String>>,
    pub documents: Vec<Vec<String>>,
    pub distances: Vec<Vec<f32>>,
}

impl QueryResult {
    /// Hits for the `n`th query, nearest first.
    #[must_use]
    pub fn hits(&self, n: usize) -> Vec<SearchHit> {
        let (Some(ids), Some(documents), Some(distances)) =
            (self.ids.get(n), self.documents.get(n), self.distances.get(n))
        else {
            return Vec::new();
        };
        ids.iter()
            .zip(documents)
            .zip(distances)
            .map(|((id, document), distance)| SearchHit {
                id: id.clone(),
                document: document.clone(),
                distance: *distance,
            })
            .collect()
    }
}

/// Outcome of a context retrieval. Never an error: retrieval degrades.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextLookup {
    /// At least one fact was retrieved, nearest first.
    Found(Vec<SearchHit>),
    /// The index is empty or nothing was returned.
    NoMatch,
    /// The memory backend could not be used.
    Unavailable { reason: String },
}

impl ContextLookup {
    /// Text to fold into the prompt. `Some` only for `Found`.
    #[must_use]
    pub fn as_context(&self) -> Option<String> {
        match self {
            Self::Found(hits) => Some(
                hits.iter()
                    .map(|h| h.document.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => None,
        }
    }

    /// Short label for envelope metadata and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::NoMatch => "none",
            Self::Unavailable { .. } => "degraded",
        }
    }
}
