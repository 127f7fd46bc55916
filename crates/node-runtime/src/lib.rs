//! # Node Runtime Library
//!
//! Composition root of an inference backbone node, exposed as a library so
//! integration tests can drive a node in-process. The binary is `main.rs`.
//!
//! ## Request Flow
//!
//! ```text
//! Ingress ──sealed envelope──→ Dispatcher(3) ──dequeue──→ RegionWorker
//!    │                                                      │
//!    └─ MemoryGateway(2) context                            ├─ ChatCompletion → StreamRelay(4) → caller
//!                                                           ├─ MemoryUpsert  → MemoryGateway(2)
//!                                                           └─ Control       → CancellationRegistry
//! ```
//!
//! Lifecycle events for every step go to the shared bus.

pub mod container;
pub mod health;
pub mod ingress;
pub mod runtime;
pub mod workers;

pub use container::{BackboneContainer, Backends, CallerSinks, ConfigError, NodeConfig};
pub use health::HealthStatus;
pub use ingress::{Ingress, IngressError, IngressRequest, Submission};
pub use runtime::NodeRuntime;
pub use workers::RegionWorker;

#[cfg(test)]
pub(crate) mod test_support;
