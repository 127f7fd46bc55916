//! # Inference Backbone Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Cross-subsystem flows through a whole node
//!     ├── harness.rs    # In-process backends and node builder
//!     ├── flows.rs      # Single-node request lifecycles
//!     └── multi_node.rs # Envelopes crossing between nodes
//!
//! tests/benches/        # Criterion benchmarks of the hot paths
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p bb-tests
//! cargo test -p bb-tests integration::multi_node
//! cargo bench -p bb-tests
//! ```

pub mod integration;
