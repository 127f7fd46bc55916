//! Outbound Ports (Driven Ports)
//!
//! Generation backend contract: request `{model, prompt, stream: true}`,
//! answered by a sequence of `{response, done}` records. `done = true`
//! ends the stream.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::RelayError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

impl GenerationRequest {
    #[must_use]
    pub fn streaming(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: true,
        }
    }
}

/// One record of a generation stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerationChunk {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

impl GenerationChunk {
    #[must_use]
    pub fn token(text: impl Into<String>) -> Self {
        Self {
            response: text.into(),
            done: false,
        }
    }

    #[must_use]
    pub fn done() -> Self {
        Self {
            response: String::new(),
            done: true,
        }
    }
}

/// Generation model endpoint (Driven Port).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Open a streaming generation.
    ///
    /// # Errors
    ///
    /// `RelayError::UpstreamUnavailable` if the backend cannot be reached
    /// or rejects the request.
    async fn open(&self, request: GenerationRequest) -> Result<Box<dyn TokenSource>, RelayError>;
}

/// An open generation stream.
#[async_trait]
pub trait TokenSource: Send {
    /// Next record. `Ok(None)` means the transport ended.
    async fn next_chunk(&mut self) -> Result<Option<GenerationChunk>, RelayError>;

    /// Actively release the upstream connection. Idempotent.
    async fn close(&mut self);
}
