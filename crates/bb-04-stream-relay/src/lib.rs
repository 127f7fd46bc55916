//! # Stream Relay Subsystem
//!
//! **Subsystem ID:** 4
//! **Status:** Production-Ready
//!
//! ## Purpose
//!
//! Opens a streaming generation request for one envelope and relays the
//! produced tokens to the caller in order, with cooperative cancellation.
//!
//! ## State Machine
//!
//! ```text
//! [OPENING] ──first chunk──→ [STREAMING] ──done──→ [COMPLETED]
//!     │                           │
//!     ├── timeout / error ──→ [FAILED] ←── error / EOF without done
//!     │                           │
//!     └──── cancel / hang-up ──→ [CANCELLED] ←── cancel / hang-up
//! ```
//!
//! Exactly one terminal transition per envelope. Nothing is relayed after
//! it, and the backend connection is closed on every terminal path.
//!
//! ## Guarantees
//!
//! | Guarantee | Enforcement Location |
//! |-----------|---------------------|
//! | Tokens in production order | `service/relay.rs` - single sequential loop |
//! | Cancel within one token boundary | `service/relay.rs` - check before each send |
//! | Upstream actively closed | `service/relay.rs` - `TokenSource::close()` |
//! | No silent truncation | EOF without `done` → `Failed` |
//! | No auto-retry | errors end the stream |

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{LineDecoder, OllamaGenerationBackend};
pub use domain::{
    response_channel, RelayError, RelayOutcome, RelayState, ResponseStream, StreamEvent,
};
pub use ports::{GenerationBackend, GenerationChunk, GenerationRequest, TokenSource};
pub use service::{CancelSignal, CancellationRegistry, RelayConfig, StreamRelay};
