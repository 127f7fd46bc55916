//! # Region Queue - Tiered Buckets with Aging
//!
//! ## Data Structures
//!
//! - `buckets[p]`: FIFO of envelopes whose base priority is `p` (0..=10)
//!
//! Only bucket fronts are ever candidates, so arrival order within one base
//! priority is preserved exactly, even under aging.
//!
//! ## Selection
//!
//! For each non-empty bucket the front's effective tier is
//! `min(10, base + waited / aging_threshold)`. The highest tier wins; equal
//! tiers go to the lowest arrival sequence number.

use super::Timestamp;
use shared_types::{Envelope, Priority};
use std::collections::VecDeque;

const TIERS: usize = Priority::MAX.value() as usize + 1;

/// Effective priority after aging.
#[must_use]
pub fn effective_tier(base: u8, waited_ms: u64, aging_threshold_ms: u64) -> u8 {
    let max = Priority::MAX.value();
    if aging_threshold_ms == 0 {
        return base.min(max);
    }
    let boost = waited_ms / aging_threshold_ms;
    let boosted = u64::from(base).saturating_add(boost);
    boosted.min(u64::from(max)) as u8
}

/// An envelope waiting in a region queue.
#[derive(Debug, Clone)]
pub struct QueuedEnvelope {
    pub envelope: Envelope,
    /// Global arrival sequence number.
    pub seq: u64,
    pub enqueued_at: Timestamp,
}

impl QueuedEnvelope {
    fn tier(&self, now: Timestamp, aging_threshold_ms: u64) -> u8 {
        effective_tier(
            self.envelope.priority().value(),
            now.saturating_sub(self.enqueued_at),
            aging_threshold_ms,
        )
    }
}

/// Priority queue for a single region.
#[derive(Debug)]
pub struct RegionQueue {
    buckets: [VecDeque<QueuedEnvelope>; TIERS],
    len: usize,
}

impl Default for RegionQueue {
    fn default() -> Self {
        Self {
            buckets: std::array::from_fn(|_| VecDeque::new()),
            len: 0,
        }
    }
}

impl RegionQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append to the bucket of the envelope's base priority.
    pub fn push(&mut self, item: QueuedEnvelope) {
        let bucket = usize::from(item.envelope.priority().value());
        self.buckets[bucket].push_back(item);
        self.len += 1;
    }

    /// Remove the envelope that should run next.
    pub fn pop(&mut self, now: Timestamp, aging_threshold_ms: u64) -> Option<QueuedEnvelope> {
        let mut best: Option<(usize, u8, u64)> = None;

        for (bucket, queue) in self.buckets.iter().enumerate() {
            let Some(front) = queue.front() else {
                continue;
            };
            let tier = front.tier(now, aging_threshold_ms);
            let better = match best {
                None => true,
                Some((_, best_tier, best_seq)) => {
                    tier > best_tier || (tier == best_tier && front.seq < best_seq)
                }
            };
            if better {
                best = Some((bucket, tier, front.seq));
            }
        }

        let (bucket, _, _) = best?;
        let item = self.buckets[bucket].pop_front()?;
        self.len -= 1;
        Some(item)
    }

    /// Arrival time of the oldest queued envelope.
    #[must_use]
    pub fn oldest_enqueued_at(&self) -> Option<Timestamp> {
        self.buckets
            .iter()
            .filter_map(|q| q.front().map(|item| item.enqueued_at))
            .min()
    }
}
