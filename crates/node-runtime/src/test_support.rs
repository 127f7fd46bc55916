//! In-process backends for runtime tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use bb_02_memory_gateway::{Embedding, EmbeddingProvider, InMemoryVectorIndex, MemoryError};
use bb_04_stream_relay::{
    GenerationBackend, GenerationChunk, GenerationRequest, RelayError, TokenSource,
};

use crate::container::{BackboneContainer, Backends, NodeConfig};

/// Keyword hits on a fixed vocabulary.
pub struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, MemoryError> {
        let text = text.to_lowercase();
        Ok(["password", "debian", "name", "weather"]
            .iter()
            .map(|w| if text.contains(w) { 1.0 } else { 0.0 })
            .collect())
    }
}

pub struct DownEmbedder;

#[async_trait]
impl EmbeddingProvider for DownEmbedder {
    async fn embed(&self, _text: &str) -> Result<Embedding, MemoryError> {
        Err(MemoryError::UpstreamUnavailable {
            reason: "connection refused".into(),
        })
    }
}

/// Streams a fixed token list. With a gate, each token waits for a permit.
pub struct ScriptBackend {
    tokens: Vec<String>,
    gate: Option<Arc<Semaphore>>,
    pub seen: Mutex<Vec<GenerationRequest>>,
    pub closed: Arc<AtomicUsize>,
}

impl ScriptBackend {
    pub fn new(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| (*t).to_string()).collect(),
            gate: None,
            seen: Mutex::new(Vec::new()),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn gated(tokens: &[&str], gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(tokens)
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.seen.lock().iter().map(|r| r.prompt.clone()).collect()
    }

    pub fn closes(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct ScriptSource {
    tokens: std::vec::IntoIter<String>,
    gate: Option<Arc<Semaphore>>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl TokenSource for ScriptSource {
    async fn next_chunk(&mut self) -> Result<Option<GenerationChunk>, RelayError> {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        Ok(Some(match self.tokens.next() {
            Some(token) => GenerationChunk::token(token),
            None => GenerationChunk::done(),
        }))
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GenerationBackend for ScriptBackend {
    async fn open(&self, request: GenerationRequest) -> Result<Box<dyn TokenSource>, RelayError> {
        self.seen.lock().push(request);
        Ok(Box::new(ScriptSource {
            tokens: self.tokens.clone().into_iter(),
            gate: self.gate.clone(),
            closed: Arc::clone(&self.closed),
        }))
    }
}

pub fn test_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.security.hmac_secret = [7u8; 32];
    config.relay.first_token_timeout = Duration::from_secs(5);
    config.dispatch.shutdown_grace = Duration::from_millis(200);
    config
}

pub fn container_with(
    config: NodeConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<ScriptBackend>,
) -> Arc<BackboneContainer> {
    let backends = Backends {
        embedder,
        index: Arc::new(InMemoryVectorIndex::new()),
        generator,
        time: None,
    };
    Arc::new(BackboneContainer::with_backends(config, backends).unwrap())
}
