//! Adapters Layer (Driven Adapters)
//!
//! - `OllamaEmbeddingProvider` - embeddings over HTTP from a local Ollama
//! - `InMemoryVectorIndex` - exhaustive-scan index held in process

pub mod in_memory;
pub mod ollama;

pub use in_memory::InMemoryVectorIndex;
pub use ollama::OllamaEmbeddingProvider;
