//! # Clock Merger Subsystem
//!
//! **Subsystem ID:** 1
//! **Status:** Production-Ready
//!
//! ## Purpose
//!
//! Establishes causal order between events produced on different nodes and
//! reconciles concurrent writes to the same logical memory key without
//! losing either write.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | `merge` is commutative, associative, idempotent | `domain/causality.rs` - pointwise max |
//! | `tick` advances only the local node | `domain/node_clock.rs` - `NodeClock::tick()` |
//! | Concurrent writes resolve deterministically | `domain/resolver.rs` - total ordering |
//! | Losing writes are retained, never deleted | `domain/store.rs` - superseded history |
//!
//! ## Conflict Policy
//!
//! ```text
//! compare(incoming, current)
//!   ├── After       → incoming replaces current  (current: CausallyReplaced)
//!   ├── Before/Equal → incoming kept as history   (incoming: Stale)
//!   └── Concurrent  → priority ↓, timestamp ↓, node id ↑
//!                     winner becomes current with merged clock
//!                     loser kept as history       (loser: LostConflict)
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! domain/causality.rs  - compare, merge, tick, CausalOrder
//! domain/node_clock.rs - NodeClock (per-node clock state)
//! domain/resolver.rs   - WriteStamp, ConflictResolver
//! domain/store.rs      - VersionedStore, WriteOutcome
//! ```

pub mod domain;

pub use domain::causality::{compare, merge, tick, CausalOrder};
pub use domain::node_clock::NodeClock;
pub use domain::resolver::{ConflictResolver, WriteStamp};
pub use domain::store::{
    KeyHistory, SupersedeReason, Superseded, Version, VersionedStore, WriteOutcome,
};
pub use shared_types::VectorClock;
