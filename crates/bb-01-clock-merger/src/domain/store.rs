//! Versioned key/value history.
//!
//! Each logical key holds exactly one current version plus every version it
//! ever displaced. Nothing is deleted; the superseded list is the audit
//! trail.

use super::causality::{compare, merge, CausalOrder};
use super::resolver::{ConflictResolver, WriteStamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A value together with the stamp of the write that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version<T> {
    pub stamp: WriteStamp,
    pub value: T,
}

/// Why a version stopped being current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupersedeReason {
    /// A causally later write replaced it.
    CausallyReplaced,
    /// It arrived causally at or before the current version.
    Stale,
    /// It lost concurrent conflict resolution.
    LostConflict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Superseded<T> {
    pub version: Version<T>,
    pub reason: SupersedeReason,
}

/// Current version and audit history for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyHistory<T> {
    pub current: Version<T>,
    pub superseded: Vec<Superseded<T>>,
}

/// Result of [`VersionedStore::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// First write for this key.
    Inserted,
    /// Incoming write causally followed the current one.
    Replaced,
    /// Incoming write was causally old; kept as history only.
    Stale,
    /// Writes were concurrent; `incoming_won` tells which side is current.
    ConflictResolved {
        incoming_won: bool,
        winner: WriteStamp,
        loser: WriteStamp,
    },
}

impl WriteOutcome {
    /// True if the incoming value is now the current version.
    #[must_use]
    pub fn incoming_is_current(&self) -> bool {
        match self {
            Self::Inserted | Self::Replaced => true,
            Self::Stale => false,
            Self::ConflictResolved { incoming_won, .. } => *incoming_won,
        }
    }
}

/// Per-key version store with causal conflict handling.
#[derive(Debug, Clone)]
pub struct VersionedStore<T> {
    entries: HashMap<String, KeyHistory<T>>,
    resolver: ConflictResolver,
}

impl<T> Default for VersionedStore<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            resolver: ConflictResolver::new(),
        }
    }
}

impl<T: Clone> VersionedStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a write to `key`.
    pub fn apply(&mut self, key: &str, stamp: WriteStamp, value: T) -> WriteOutcome {
        let incoming = Version { stamp, value };

        let Some(history) = self.entries.get_mut(key) else {
            self.entries.insert(
                key.to_string(),
                KeyHistory {
                    current: incoming,
                    superseded: Vec::new(),
                },
            );
            return WriteOutcome::Inserted;
        };

        match compare(&incoming.stamp.clock, &history.current.stamp.clock) {
            CausalOrder::After => {
                let old = std::mem::replace(&mut history.current, incoming);
                history.superseded.push(Superseded {
                    version: old,
                    reason: SupersedeReason::CausallyReplaced,
                });
                WriteOutcome::Replaced
            }
            CausalOrder::Before | CausalOrder::Equal => {
                history.superseded.push(Superseded {
                    version: incoming,
                    reason: SupersedeReason::Stale,
                });
                WriteOutcome::Stale
            }
            CausalOrder::Concurrent => {
                let merged = merge(&incoming.stamp.clock, &history.current.stamp.clock);
                let incoming_won = self.resolver.prefers(&incoming.stamp, &history.current.stamp);

                let (mut winner, loser) = if incoming_won {
                    let old = std::mem::replace(&mut history.current, incoming);
                    (history.current.clone(), old)
                } else {
                    (history.current.clone(), incoming)
                };
                let outcome = WriteOutcome::ConflictResolved {
                    incoming_won,
                    winner: winner.stamp.clone(),
                    loser: loser.stamp.clone(),
                };

                tracing::debug!(
                    key,
                    winner = %winner.stamp.node_id,
                    loser = %loser.stamp.node_id,
                    "Concurrent write resolved"
                );

                winner.stamp.clock = merged;
                history.current = winner;
                history.superseded.push(Superseded {
                    version: loser,
                    reason: SupersedeReason::LostConflict,
                });
                outcome
            }
        }
    }

    /// Current version for `key`.
    #[must_use]
    pub fn current(&self, key: &str) -> Option<&Version<T>> {
        self.entries.get(key).map(|h| &h.current)
    }

    /// Current version plus all superseded versions for `key`.
    #[must_use]
    pub fn history(&self, key: &str) -> Option<&KeyHistory<T>> {
        self.entries.get(key)
    }

    /// Put back a history captured before a write that has to be undone.
    ///
    /// `None` removes the key again.
    pub fn restore(&mut self, key: &str, history: Option<KeyHistory<T>>) {
        match history {
            Some(history) => {
                self.entries.insert(key.to_string(), history);
            }
            None => {
                self.entries.remove(key);
            }
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
