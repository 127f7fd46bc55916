//! Ollama embedding adapter.
//!
//! `POST {base}/api/embeddings` with `{model, prompt}`, answered by
//! `{embedding: [f32]}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::domain::Embedding;
use crate::error::MemoryError;
use crate::ports::EmbeddingProvider;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Embedding provider backed by a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaEmbeddingProvider {
    /// Build a provider for `base_url` (e.g. `http://127.0.0.1:11434`).
    ///
    /// # Errors
    ///
    /// `UpstreamUnavailable` if the HTTP client cannot be constructed.
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MemoryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(MemoryError::unavailable)?;
        Ok(Self {
            client,
            url: format!("{}/api/embeddings", base_url.trim_end_matches('/')),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Embedding, MemoryError> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| MemoryError::unavailable(format!("{}: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MemoryError::unavailable(format!(
                "{} answered HTTP {status}",
                self.url
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::unavailable(format!("undecodable embedding: {e}")))?;

        if body.embedding.is_empty() {
            return Err(MemoryError::EmptyEmbedding);
        }
        debug!(model = %self.model, dimension = body.embedding.len(), "Embedded text");
        Ok(body.embedding)
    }
}
