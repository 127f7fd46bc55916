//! Pure vector clock operations.
//!
//! Missing entries read as 0 throughout, so `{a:0}` and `{}` compare
//! `Equal`.

use serde::{Deserialize, Serialize};
use shared_types::VectorClock;
use std::iter;

/// Causal relation of one clock to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CausalOrder {
    /// Left happened before right.
    Before,
    /// Left happened after right.
    After,
    /// Pointwise identical.
    Equal,
    /// Neither dominates.
    Concurrent,
}

impl CausalOrder {
    /// The relation seen from the other side.
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            Self::Before => Self::After,
            Self::After => Self::Before,
            other => other,
        }
    }

    #[must_use]
    pub fn is_concurrent(self) -> bool {
        matches!(self, Self::Concurrent)
    }
}

/// Compare `a` against `b`.
#[must_use]
pub fn compare(a: &VectorClock, b: &VectorClock) -> CausalOrder {
    let mut a_le_b = true;
    let mut b_le_a = true;

    for node in a.nodes().chain(b.nodes()) {
        let (x, y) = (a.get(node), b.get(node));
        if x > y {
            a_le_b = false;
        }
        if y > x {
            b_le_a = false;
        }
        if !a_le_b && !b_le_a {
            return CausalOrder::Concurrent;
        }
    }

    match (a_le_b, b_le_a) {
        (true, true) => CausalOrder::Equal,
        (true, false) => CausalOrder::Before,
        (false, true) => CausalOrder::After,
        (false, false) => CausalOrder::Concurrent,
    }
}

/// Pointwise maximum over every node present in either clock.
#[must_use]
pub fn merge(a: &VectorClock, b: &VectorClock) -> VectorClock {
    a.nodes()
        .chain(b.nodes())
        .map(|node| (node.to_string(), a.get(node).max(b.get(node))))
        .collect()
}

/// Copy of `clock` with `node`'s entry incremented by one.
#[must_use]
pub fn tick(clock: &VectorClock, node: &str) -> VectorClock {
    let next = clock.get(node).saturating_add(1);
    clock
        .iter()
        .map(|(n, c)| (n.to_string(), c))
        .chain(iter::once((node.to_string(), next)))
        .collect()
}
