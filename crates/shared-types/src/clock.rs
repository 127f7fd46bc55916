//! # Vector Clock Value Type
//!
//! The causal-ordering metadata carried by every envelope. This type is a
//! plain value: it can be read and constructed, but the causal operations
//! (`compare`, `merge`, `tick`) live in the clock-merger subsystem so that
//! only a node's own `NodeClock` ever advances its entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from node identifier to a monotonically non-decreasing counter.
///
/// Backed by a `BTreeMap` so that iteration (and therefore the canonical
/// serialization used for sealing) is always in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock {
    entries: BTreeMap<String, u64>,
}

impl VectorClock {
    /// Create an empty clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter for `node`. Missing entries read as 0.
    #[must_use]
    pub fn get(&self, node: &str) -> u64 {
        self.entries.get(node).copied().unwrap_or(0)
    }

    /// Iterate entries in node-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(node, counter)| (node.as_str(), *counter))
    }

    /// Node identifiers present in this clock.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of nodes with an explicit entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no node has an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counters. Used as a cheap "how much history" indicator.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.entries.values().fold(0u64, |acc, c| acc.saturating_add(*c))
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for VectorClock {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut entries = BTreeMap::new();
        for (node, counter) in iter {
            entries.insert(node.into(), counter);
        }
        Self { entries }
    }
}

impl std::fmt::Display for VectorClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (node, counter)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{node}:{counter}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entry_reads_zero() {
        let clock: VectorClock = [("n1", 3)].into_iter().collect();
        assert_eq!(clock.get("n1"), 3);
        assert_eq!(clock.get("n2"), 0);
    }

    #[test]
    fn test_serializes_as_sorted_map() {
        let clock: VectorClock = [("zeta", 1), ("alpha", 2)].into_iter().collect();
        let json = serde_json::to_string(&clock).unwrap();
        assert_eq!(json, r#"{"alpha":2,"zeta":1}"#);
    }

    #[test]
    fn test_display() {
        let clock: VectorClock = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(clock.to_string(), "{a:1, b:2}");
        assert_eq!(VectorClock::new().to_string(), "{}");
    }
}
