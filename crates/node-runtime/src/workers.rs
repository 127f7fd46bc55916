//! # Region Workers
//!
//! Each served region gets its own pool of tasks looping on
//! `Dispatcher::dequeue`. A worker owns an envelope from dequeue until it
//! retires the trace id; every path through [`RegionWorker::handle`] ends
//! with that retire.
//!
//! | Payload | Handling |
//! |---------|----------|
//! | `ChatCompletion` | relay into the parked caller sink |
//! | `MemoryUpsert` | `MemoryGateway::remember` with the envelope's causal stamp |
//! | `Control::Cancel` | cancel or park through the cancellation registry |

use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use backbone_telemetry::{
    metric_inc, time_histogram, MEMORY_CONFLICTS, QUEUE_DEPTH, STREAMS_TERMINATED,
    STREAM_DURATION, TOKENS_RELAYED,
};
use bb_01_clock_merger::{WriteOutcome, WriteStamp};
use bb_04_stream_relay::RelayState;
use shared_bus::{BackboneEvent, StreamOutcome};
use shared_types::{ControlCommand, Envelope, Payload, Region};

use crate::container::BackboneContainer;

/// One task of a region's worker pool.
pub struct RegionWorker {
    region: Region,
    index: usize,
    container: Arc<BackboneContainer>,
}

impl RegionWorker {
    #[must_use]
    pub fn new(region: Region, index: usize, container: Arc<BackboneContainer>) -> Self {
        Self {
            region,
            index,
            container,
        }
    }

    /// Process envelopes until the dispatcher shuts down.
    pub async fn run(self) {
        let span = info_span!("region_worker", region = %self.region, worker = self.index);
        async move {
            debug!("Worker started");
            while let Some(envelope) = self.container.dispatcher.dequeue(self.region).await {
                self.handle(envelope).await;
            }
            debug!("Worker stopped");
        }
        .instrument(span)
        .await;
    }

    /// Handle one dequeued envelope and retire it.
    pub async fn handle(&self, envelope: Envelope) {
        let c = &self.container;
        let trace_id = envelope.trace_id().clone();

        QUEUE_DEPTH
            .with_label_values(&[self.region.as_str()])
            .set(c.dispatcher.depth(self.region) as i64);
        c.clock.observe(envelope.vector_clock());
        c.publish(BackboneEvent::EnvelopeDispatched {
            trace_id: trace_id.clone(),
            region: self.region,
            worker: self.index,
        })
        .await;

        match envelope.payload() {
            Payload::ChatCompletion { .. } => self.relay(&envelope).await,
            Payload::MemoryUpsert { id, text } => self.remember(&envelope, id, text).await,
            Payload::Control {
                command: ControlCommand::Cancel { trace_id: target },
            } => {
                c.request_cancel(target).await;
            }
        }

        // Retire first: a cancel arriving after this finds nothing to park
        c.dispatcher.retire(&trace_id);
        c.cancellations.unregister(&trace_id);
    }

    async fn relay(&self, envelope: &Envelope) {
        let c = &self.container;
        let trace_id = envelope.trace_id();

        let Some(sink) = c.sinks.take(trace_id) else {
            warn!(%trace_id, "No caller waiting, skipping generation");
            self.finished(envelope, StreamOutcome::Cancelled, 0, None)
                .await;
            return;
        };

        let signal = c.cancellations.register(trace_id);
        c.publish(BackboneEvent::StreamStarted {
            trace_id: trace_id.clone(),
            region: self.region,
        })
        .await;

        let outcome = {
            let _timer = time_histogram!(STREAM_DURATION);
            c.relay.run(envelope, signal, sink).await
        };
        TOKENS_RELAYED.inc_by(outcome.tokens as u64);

        let result = match outcome.state {
            RelayState::Completed => StreamOutcome::Completed,
            RelayState::Cancelled => StreamOutcome::Cancelled,
            _ => StreamOutcome::Failed,
        };
        info!(%trace_id, outcome = ?result, tokens = outcome.tokens, "Stream finished");
        self.finished(
            envelope,
            result,
            outcome.tokens,
            outcome.error.map(|e| e.to_string()),
        )
        .await;
    }

    async fn finished(
        &self,
        envelope: &Envelope,
        outcome: StreamOutcome,
        tokens: usize,
        error: Option<String>,
    ) {
        let label = match outcome {
            StreamOutcome::Completed => "completed",
            StreamOutcome::Cancelled => "cancelled",
            StreamOutcome::Failed => "failed",
        };
        metric_inc!(STREAMS_TERMINATED, &[label]);
        self.container
            .publish(BackboneEvent::StreamFinished {
                trace_id: envelope.trace_id().clone(),
                outcome,
                tokens,
                error,
            })
            .await;
    }

    async fn remember(&self, envelope: &Envelope, key: &str, text: &str) {
        let c = &self.container;
        let stamp = WriteStamp::new(
            envelope.origin_node(),
            envelope.vector_clock().clone(),
            envelope.priority(),
            envelope.timestamp(),
        );

        match c.memory.remember(key, text, stamp).await {
            Ok(outcome) => {
                let label = match &outcome {
                    WriteOutcome::Inserted => "inserted",
                    WriteOutcome::Replaced => "replaced",
                    WriteOutcome::Stale => "stale",
                    WriteOutcome::ConflictResolved { .. } => {
                        metric_inc!(MEMORY_CONFLICTS);
                        "conflict_resolved"
                    }
                };
                info!(trace_id = %envelope.trace_id(), key, outcome = label, "Memory written");
                c.publish(BackboneEvent::MemoryWritten {
                    key: key.to_string(),
                    outcome: label.to_string(),
                })
                .await;
            }
            Err(e) => {
                // Writes are not retried
                warn!(trace_id = %envelope.trace_id(), key, error = %e, "Memory write failed");
                c.publish(BackboneEvent::MemoryDegraded {
                    trace_id: envelope.trace_id().clone(),
                    reason: e.to_string(),
                })
                .await;
            }
        }
    }
}
