//! Test harness: a full node wired to in-process backends.

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
use node_runtime::{BackboneContainer, Backends, NodeConfig, NodeRuntime};

pub const SHARED_SECRET: [u8; 32] = [0x42; 32];

/// Bag-of-words embedder over a fixed vocabulary.
pub struct VocabularyEmbedder;

#[async_trait]
impl EmbeddingProvider for VocabularyEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, MemoryError> {
        let text = text.to_lowercase();
        Ok(["password", "debian", "name", "weather", "rust"]
            .iter()
            .map(|w| if text.contains(w) { 1.0 } else { 0.0 })
            .collect())
    }
}

/// Embedder whose backend is unreachable.
pub struct UnreachableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnreachableEmbedder {
    async fn embed(&self, _text: &str) -> Result<Embedding, MemoryError> {
        Err(MemoryError::UpstreamUnavailable {
            reason: "connection refused".into(),
        })
    }
}

/// Echoes the prompt back word by word, optionally waiting for a permit
/// before each record.
pub struct EchoBackend {
    gate: Option<Arc<Semaphore>>,
    prompts: Mutex<Vec<String>>,
    closed: Arc<AtomicUsize>,
}

impl EchoBackend {
    pub fn new() -> Self {
        Self {
            gate: None,
            prompts: Mutex::new(Vec::new()),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn closes(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct EchoSource {
    words: std::vec::IntoIter<String>,
    gate: Option<Arc<Semaphore>>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl TokenSource for EchoSource {
    async fn next_chunk(&mut self) -> Result<Option<GenerationChunk>, RelayError> {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        Ok(Some(match self.words.next() {
            Some(word) => GenerationChunk::token(word),
            None => GenerationChunk::done(),
        }))
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GenerationBackend for EchoBackend {
    async fn open(&self, request: GenerationRequest) -> Result<Box<dyn TokenSource>, RelayError> {
        let question = request
            .prompt
            .rsplit("User Question: ")
            .next()
            .unwrap_or_default()
            .to_string();
        self.prompts.lock().push(request.prompt);
        let words: Vec<String> = question
            .split_inclusive(' ')
            .map(str::to_string)
            .collect();
        Ok(Box::new(EchoSource {
            words: words.into_iter(),
            gate: self.gate.clone(),
            closed: Arc::clone(&self.closed),
        }))
    }
}

pub fn node_config(node_id: &str) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.node.node_id = node_id.to_string();
    config.security.hmac_secret = SHARED_SECRET;
    config.relay.first_token_timeout = Duration::from_secs(5);
    config.dispatch.shutdown_grace = Duration::from_millis(500);
    config
}

/// A node and the backends it talks to.
pub struct TestNode {
    pub runtime: NodeRuntime,
    pub container: Arc<BackboneContainer>,
    pub backend: Arc<EchoBackend>,
}

impl TestNode {
    pub fn build(
        config: NodeConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        backend: EchoBackend,
    ) -> Self {
        let backend = Arc::new(backend);
        let generator: Arc<dyn GenerationBackend> = backend.clone();
        let container = Arc::new(
            BackboneContainer::with_backends(
                config,
                Backends {
                    embedder,
                    index: Arc::new(InMemoryVectorIndex::new()),
                    generator,
                    time: None,
                },
            )
            .unwrap(),
        );
        let runtime = NodeRuntime::new(Arc::clone(&container));
        Self {
            runtime,
            container,
            backend,
        }
    }

    /// A started node with working memory.
    pub fn started(node_id: &str) -> Self {
        let node = Self::build(
            node_config(node_id),
            Arc::new(VocabularyEmbedder),
            EchoBackend::new(),
        );
        node.runtime.start();
        node
    }
}
