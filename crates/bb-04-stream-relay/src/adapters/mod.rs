//! Adapters Layer (Driven Adapters)
//!
//! - `OllamaGenerationBackend` - streaming `/api/generate` over HTTP
//! - `LineDecoder` - reassembles newline-delimited records across body chunks

pub mod line_decoder;
pub mod ollama;

pub use line_decoder::LineDecoder;
pub use ollama::OllamaGenerationBackend;
