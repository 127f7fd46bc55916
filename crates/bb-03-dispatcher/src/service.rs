//! Dispatcher Service
//!
//! Per-region queues behind independent locks, a shared ownership table, and
//! a `Notify` per region to park idle workers.
//!
//! Lock order is always queue, then ownership.

use parking_lot::Mutex;
use shared_types::{Envelope, Region, TraceId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::domain::{
    DispatchError, DispatcherConfig, DispatcherStatus, OwnershipState, OwnershipTable,
    QueuedEnvelope, RegionQueue, RegionStatus,
};
use crate::ports::{SystemTimeSource, TimeSource};

struct RegionSlot {
    queue: Mutex<RegionQueue>,
    notify: Notify,
}

/// Region-aware priority dispatcher.
pub struct Dispatcher {
    config: DispatcherConfig,
    time: Arc<dyn TimeSource>,
    slots: HashMap<Region, RegionSlot>,
    ownership: Mutex<OwnershipTable>,
    next_seq: AtomicU64,
    shut_down: AtomicBool,
}

impl Dispatcher {
    /// Create a dispatcher reading wall-clock time.
    ///
    /// # Errors
    ///
    /// `DispatchError::InvalidConfig` for unusable configuration.
    pub fn new(config: DispatcherConfig) -> Result<Self, DispatchError> {
        Self::with_time_source(config, Arc::new(SystemTimeSource))
    }

    /// Create a dispatcher with an injected time source.
    ///
    /// # Errors
    ///
    /// `DispatchError::InvalidConfig` for unusable configuration.
    pub fn with_time_source(
        config: DispatcherConfig,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, DispatchError> {
        config.validate()?;
        let slots = config
            .regions
            .iter()
            .map(|region| {
                (
                    *region,
                    RegionSlot {
                        queue: Mutex::new(RegionQueue::new()),
                        notify: Notify::new(),
                    },
                )
            })
            .collect();
        let ttl_ms = config.ownership_ttl.as_millis() as u64;

        Ok(Self {
            config,
            time,
            slots,
            ownership: Mutex::new(OwnershipTable::new(ttl_ms)),
            next_seq: AtomicU64::new(0),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Regions served by this dispatcher.
    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.config.regions.iter().copied()
    }

    /// Queue a sealed envelope for its target region.
    ///
    /// # Errors
    ///
    /// - `ShutDown` after [`Dispatcher::shutdown`]
    /// - `RegionNotServed` for regions without a pool here
    /// - `NotSealed` for unsealed envelopes
    /// - `QueueOverflow` when the region already holds `queue_bound` items
    /// - `Duplicate` when the trace id is still owned
    pub fn enqueue(&self, envelope: Envelope) -> Result<(), DispatchError> {
        if self.is_shut_down() {
            return Err(DispatchError::ShutDown);
        }
        let region = envelope.target_region();
        let slot = self
            .slots
            .get(&region)
            .ok_or(DispatchError::RegionNotServed { region })?;
        if !envelope.is_sealed() {
            return Err(DispatchError::NotSealed {
                trace_id: envelope.trace_id().clone(),
            });
        }

        let now = self.time.now();
        {
            let mut queue = slot.queue.lock();
            let depth = queue.len();
            if depth >= self.config.queue_bound {
                warn!(%region, depth, "Queue overflow, rejecting envelope");
                return Err(DispatchError::QueueOverflow {
                    region,
                    depth,
                    bound: self.config.queue_bound,
                });
            }

            self.ownership.lock().try_claim(envelope.trace_id(), now)?;

            debug!(
                trace_id = %envelope.trace_id(),
                %region,
                priority = envelope.priority().value(),
                "Envelope queued"
            );
            queue.push(QueuedEnvelope {
                envelope,
                seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
                enqueued_at: now,
            });
        }
        slot.notify.notify_one();
        Ok(())
    }

    /// Take the next envelope for `region` without waiting.
    ///
    /// The returned envelope is owned by the caller until [`Dispatcher::retire`].
    pub fn try_dequeue(&self, region: Region) -> Option<Envelope> {
        let slot = self.slots.get(&region)?;
        let now = self.time.now();
        let item = slot
            .queue
            .lock()
            .pop(now, self.config.aging_threshold.as_millis() as u64)?;

        self.ownership
            .lock()
            .mark_in_flight(item.envelope.trace_id(), now);
        debug!(
            trace_id = %item.envelope.trace_id(),
            %region,
            waited_ms = now.saturating_sub(item.enqueued_at),
            "Envelope dequeued"
        );
        Some(item.envelope)
    }

    /// Wait for the next envelope for `region`.
    ///
    /// Returns `None` once the dispatcher is shut down, or immediately for
    /// regions not served here.
    pub async fn dequeue(&self, region: Region) -> Option<Envelope> {
        let slot = self.slots.get(&region)?;
        loop {
            let notified = slot.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent shutdown is not missed
            notified.as_mut().enable();

            if self.is_shut_down() {
                return None;
            }
            if let Some(envelope) = self.try_dequeue(region) {
                return Some(envelope);
            }
            notified.await;
        }
    }

    /// Record the terminal state of `trace_id`.
    ///
    /// The id stays reserved for `ownership_ttl`. Returns false if the id
    /// was not owned.
    pub fn retire(&self, trace_id: &TraceId) -> bool {
        let retired = self.ownership.lock().retire(trace_id, self.time.now());
        if !retired {
            debug!(%trace_id, "Retire for unowned trace");
        }
        retired
    }

    /// Ownership state of `trace_id`, if any.
    pub fn ownership_state(&self, trace_id: &TraceId) -> Option<OwnershipState> {
        self.ownership.lock().state(trace_id, self.time.now())
    }

    /// Number of queued envelopes for `region`.
    pub fn depth(&self, region: Region) -> usize {
        self.slots
            .get(&region)
            .map_or(0, |slot| slot.queue.lock().len())
    }

    pub fn status(&self) -> DispatcherStatus {
        let now = self.time.now();
        let regions = self
            .config
            .regions
            .iter()
            .filter_map(|region| {
                let slot = self.slots.get(region)?;
                let queue = slot.queue.lock();
                Some(RegionStatus {
                    region: *region,
                    depth: queue.len(),
                    oldest_wait_ms: queue
                        .oldest_enqueued_at()
                        .map_or(0, |t| now.saturating_sub(t)),
                })
            })
            .collect();

        DispatcherStatus {
            regions,
            owned_traces: self.ownership.lock().len(),
            queue_bound: self.config.queue_bound,
            shut_down: self.is_shut_down(),
        }
    }

    /// Stop accepting work and wake every waiting worker.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let abandoned: usize = self.slots.values().map(|s| s.queue.lock().len()).sum();
        info!(abandoned, "Dispatcher shutting down");
        for slot in self.slots.values() {
            slot.notify.notify_waiters();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}
