//! # Backbone Container
//!
//! Holds every subsystem instance with explicit dependencies. Nothing is
//! global: tests build a container around in-process fakes through
//! [`BackboneContainer::with_backends`].
//!
//! ## Initialization Order
//!
//! ```text
//! Level 0: signer, node clock, event bus (no dependencies)
//! Level 1: memory gateway (embedding provider + vector index)
//! Level 2: dispatcher (region set from config)
//! Level 3: stream relay (generation backend), cancellation registry
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use bb_01_clock_merger::NodeClock;
use bb_02_memory_gateway::{
    EmbeddingProvider, InMemoryVectorIndex, MemoryGateway, OllamaEmbeddingProvider, VectorIndex,
};
use bb_03_dispatcher::{Dispatcher, OwnershipState, TimeSource};
use bb_04_stream_relay::{
    CancellationRegistry, GenerationBackend, OllamaGenerationBackend, StreamRelay,
};
use shared_bus::{BackboneEvent, EventPublisher, InMemoryEventBus};
use shared_types::{HmacSigner, TraceId};

use super::config::NodeConfig;
use super::sinks::CallerSinks;

/// External backends the node talks to.
pub struct Backends {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub index: Arc<dyn VectorIndex>,
    pub generator: Arc<dyn GenerationBackend>,
    /// Dispatcher clock override, `None` for wall time.
    pub time: Option<Arc<dyn TimeSource>>,
}

/// Central container holding all subsystem instances.
pub struct BackboneContainer {
    // =========================================================================
    // LEVEL 0: No Dependencies
    // =========================================================================
    /// Envelope sealing.
    pub signer: Arc<HmacSigner>,

    /// This node's vector clock (ClockMerger, Subsystem 1).
    pub clock: Arc<NodeClock>,

    /// Lifecycle events.
    pub event_bus: Arc<InMemoryEventBus>,

    // =========================================================================
    // LEVEL 1-3
    // =========================================================================
    /// Memory Gateway (Subsystem 2)
    pub memory: Arc<MemoryGateway>,

    /// Dispatcher (Subsystem 3)
    pub dispatcher: Arc<Dispatcher>,

    /// Stream Relay (Subsystem 4)
    pub relay: Arc<StreamRelay>,

    /// Live cancellation flags.
    pub cancellations: Arc<CancellationRegistry>,

    /// Caller channels waiting for a worker.
    pub sinks: Arc<CallerSinks>,

    /// Node configuration (immutable after initialization).
    pub config: NodeConfig,
}

impl BackboneContainer {
    /// Build a container talking to the configured HTTP backend with an
    /// in-memory vector index.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or an HTTP client cannot be
    /// built.
    pub fn new(config: NodeConfig) -> Result<Self> {
        let embedder = OllamaEmbeddingProvider::new(
            &config.backend.url,
            config.backend.embedding_model.clone(),
            config.backend.request_timeout,
        )
        .context("Failed to build embedding client")?;
        let generator =
            OllamaGenerationBackend::new(&config.backend.url, config.backend.request_timeout)
                .context("Failed to build generation client")?;

        Self::with_backends(
            config,
            Backends {
                embedder: Arc::new(embedder),
                index: Arc::new(InMemoryVectorIndex::new()),
                generator: Arc::new(generator),
                time: None,
            },
        )
    }

    /// Build a container around explicit backends.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid.
    #[instrument(name = "backbone_init", skip_all, fields(node_id = %config.node.node_id))]
    pub fn with_backends(config: NodeConfig, backends: Backends) -> Result<Self> {
        config.validate().context("Invalid node configuration")?;
        info!("Initializing backbone container");

        // =====================================================================
        // LEVEL 0
        // =====================================================================
        let signer = Arc::new(
            HmacSigner::new(&config.security.hmac_secret).context("Invalid sealing secret")?,
        );
        let clock = Arc::new(NodeClock::new(config.node.node_id.clone()));
        let event_bus = Arc::new(InMemoryEventBus::new());
        debug!("  [0] signer, clock and event bus ready");

        // =====================================================================
        // LEVEL 1-3
        // =====================================================================
        let memory = Arc::new(MemoryGateway::new(backends.embedder, backends.index));
        debug!("  [2] Memory Gateway initialized");

        let dispatcher_config = config.dispatcher_config();
        let dispatcher = match backends.time {
            Some(time) => Dispatcher::with_time_source(dispatcher_config, time),
            None => Dispatcher::new(dispatcher_config),
        }
        .context("Failed to build dispatcher")?;
        debug!(regions = ?config.served_regions(), "  [3] Dispatcher initialized");

        let relay = Arc::new(StreamRelay::new(backends.generator, config.relay_config()));
        debug!("  [4] Stream Relay initialized");

        Ok(Self {
            signer,
            clock,
            event_bus,
            memory,
            dispatcher: Arc::new(dispatcher),
            relay,
            cancellations: Arc::new(CancellationRegistry::new()),
            sinks: Arc::new(CallerSinks::new()),
            config,
        })
    }

    /// Cancel `trace_id` wherever it is.
    ///
    /// A running stream is signalled directly. A trace the dispatcher still
    /// owns but no relay has registered yet gets a parked cancellation that
    /// the relay observes before opening. Returns whether anything was
    /// signalled.
    pub async fn request_cancel(&self, trace_id: &TraceId) -> bool {
        if self.cancellations.cancel(trace_id) {
            self.publish(BackboneEvent::CancelRequested {
                trace_id: trace_id.clone(),
                parked: false,
            })
            .await;
            return true;
        }

        if !self.park_if_owned(trace_id) {
            debug!(%trace_id, "Nothing to cancel");
            return false;
        }
        self.publish(BackboneEvent::CancelRequested {
            trace_id: trace_id.clone(),
            parked: true,
        })
        .await;
        true
    }

    /// Park a cancellation, keeping it only while the trace is owned.
    ///
    /// Parks before reading ownership. Workers retire before they
    /// unregister, so either the check sees the retirement or the worker's
    /// `unregister` runs after the park and removes it.
    fn park_if_owned(&self, trace_id: &TraceId) -> bool {
        self.cancellations.park(trace_id);
        match self.dispatcher.ownership_state(trace_id) {
            Some(OwnershipState::Queued | OwnershipState::InFlight) => true,
            Some(OwnershipState::Retired) | None => {
                self.cancellations.discard_parked(trace_id);
                false
            }
        }
    }

    /// Publish a lifecycle event. Observers are optional.
    pub async fn publish(&self, event: BackboneEvent) {
        self.event_bus.publish(event).await;
    }
}
