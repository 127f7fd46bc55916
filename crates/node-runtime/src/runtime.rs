//! Node lifecycle: worker pools up, graceful shutdown down.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use bb_04_stream_relay::StreamEvent;
use shared_bus::BackboneEvent;

use crate::container::BackboneContainer;
use crate::health::HealthStatus;
use crate::ingress::Ingress;
use crate::workers::RegionWorker;

/// Terminal error sent to callers whose envelope never left the queue.
const SHUTDOWN_REASON: &str = "node shutting down";

/// How long cancelled streams get to emit their terminal event.
const CANCEL_DRAIN: Duration = Duration::from_millis(500);

/// The node runtime orchestrating the worker pools.
pub struct NodeRuntime {
    container: Arc<BackboneContainer>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl NodeRuntime {
    #[must_use]
    pub fn new(container: Arc<BackboneContainer>) -> Self {
        Self {
            container,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the configured worker pool for every served region.
    ///
    /// Calling it twice is a no-op.
    pub fn start(&self) {
        let mut workers = self.workers.lock();
        if !workers.is_empty() {
            return;
        }
        for (region, count) in &self.container.config.dispatch.region_workers {
            for index in 0..*count {
                let worker = RegionWorker::new(*region, index, Arc::clone(&self.container));
                workers.push(tokio::spawn(worker.run()));
            }
            info!(%region, workers = count, "Region worker pool started");
        }
    }

    /// Ingress bound to this node.
    #[must_use]
    pub fn ingress(&self) -> Ingress {
        Ingress::new(Arc::clone(&self.container))
    }

    #[must_use]
    pub fn health(&self) -> HealthStatus {
        HealthStatus::probe(&self.container)
    }

    #[must_use]
    pub fn container(&self) -> Arc<BackboneContainer> {
        Arc::clone(&self.container)
    }

    /// Shutdown the node gracefully.
    ///
    /// ## Shutdown Sequence
    ///
    /// 1. Stop accepting envelopes and wake idle workers
    /// 2. Fail every caller whose envelope is still queued
    /// 3. Let in-flight streams finish within the grace period
    /// 4. Cancel the streams still running and give them a moment to close
    /// 5. Abort whatever is still running
    ///
    /// Queued envelopes are abandoned, not drained. Returns how many.
    pub async fn shutdown(&self) -> usize {
        info!("Initiating graceful shutdown...");
        let c = &self.container;

        let abandoned: usize = c.dispatcher.regions().map(|r| c.dispatcher.depth(r)).sum();
        c.dispatcher.shutdown();
        c.publish(BackboneEvent::ShuttingDown { abandoned }).await;
        if abandoned > 0 {
            warn!(abandoned, "Queued envelopes abandoned at shutdown");
        }

        for (trace_id, sink) in c.sinks.drain() {
            // A parked sink has seen no events, so there is room
            if sink.try_send(StreamEvent::failed(SHUTDOWN_REASON)).is_err() {
                debug!(%trace_id, "Abandoned caller already gone");
            }
        }

        let mut handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        let grace = tokio::time::Instant::now() + c.config.dispatch.shutdown_grace;
        handles = Self::join_until(handles, grace).await;

        if !handles.is_empty() {
            let cancelled = c.cancellations.cancel_all();
            warn!(cancelled, "Streams still running after grace period, cancelling");
            let drain = tokio::time::Instant::now() + CANCEL_DRAIN;
            for handle in Self::join_until(handles, drain).await {
                warn!("Worker did not stop after cancel, aborting");
                handle.abort();
            }
        }

        info!("Shutdown complete");
        abandoned
    }

    /// Wait for workers until `deadline`; returns the ones still running.
    async fn join_until(
        handles: Vec<JoinHandle<()>>,
        deadline: tokio::time::Instant,
    ) -> Vec<JoinHandle<()>> {
        let mut running = Vec::new();
        for mut handle in handles {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                running.push(handle);
            }
        }
        running
    }
}
