//! # Dispatcher Subsystem
//!
//! **Subsystem ID:** 3
//! **Status:** Production-Ready
//!
//! ## Purpose
//!
//! Accepts sealed envelopes, queues them per target region by priority,
//! and hands each one to exactly one worker of that region's pool.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | FIFO within equal priority | `domain/queue.rs` - one FIFO bucket per tier |
//! | Higher priority first | `domain/queue.rs` - `pop()` picks highest tier |
//! | No starvation | `domain/queue.rs` - `effective_tier()` aging |
//! | Bounded depth | `service.rs` - `enqueue()` overflow check |
//! | Never cross-region | `service.rs` - per-region slots |
//! | One owner per trace id | `domain/ownership.rs` - `try_claim()` |
//!
//! ## Ownership Lifecycle
//!
//! ```text
//! enqueue ──→ [QUEUED] ──dequeue──→ [IN_FLIGHT] ──retire──→ [RETIRED]
//!                                        │                      │
//!                                        └──── TTL expiry ──────┴──→ (forgotten)
//! ```
//!
//! A trace id is rejected as `Duplicate` for as long as any entry exists.
//!
//! ## Module Structure
//!
//! ```text
//! domain/config.rs    - DispatcherConfig
//! domain/errors.rs    - DispatchError
//! domain/queue.rs     - RegionQueue (tiered buckets, aging)
//! domain/ownership.rs - OwnershipTable
//! ports/outbound.rs   - TimeSource
//! service.rs          - Dispatcher
//! ```

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{
    effective_tier, DispatchError, DispatcherConfig, DispatcherStatus, OwnershipState,
    OwnershipTable, RegionQueue, RegionStatus, Timestamp,
};
pub use ports::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use service::Dispatcher;
