//! # Ingress
//!
//! Entry point for user traffic. A chat request is enriched with retrieved
//! memory, stamped with this node's clock, sealed and queued; the caller
//! gets a stream that the region worker fills.
//!
//! ```text
//! prompt ──validate──→ MemoryGateway::search (degrades, never fails)
//!        ──envelope──→ enrich (clock tick, meta, context, model)
//!        ──seal──────→ park caller sink ──enqueue──→ Dispatcher
//! ```

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use backbone_telemetry::{ENVELOPES_ENQUEUED, ENVELOPES_REJECTED, MEMORY_LOOKUPS, QUEUE_DEPTH};
use bb_02_memory_gateway::ContextLookup;
use bb_03_dispatcher::DispatchError;
use bb_04_stream_relay::{response_channel, ResponseStream};
use shared_bus::BackboneEvent;
use shared_types::{
    Enrichment, Envelope, EnvelopeError, Payload, Region, SecurityLevel, TraceId, ValidationError,
};

use crate::container::BackboneContainer;

/// Priority of user-facing chat requests.
pub const CHAT_PRIORITY: i64 = 10;

/// Priority of background memory writes.
pub const MEMORY_WRITE_PRIORITY: i64 = 1;

/// A chat request as received from a client.
#[derive(Debug, Clone, Default)]
pub struct IngressRequest {
    pub prompt: String,
    /// Caller-chosen id, generated when absent.
    pub trace_id: Option<String>,
    /// Target region, the configured default when absent.
    pub region: Option<Region>,
}

impl IngressRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }
}

/// A queued request and the stream its tokens will arrive on.
#[derive(Debug)]
pub struct Submission {
    pub trace_id: TraceId,
    pub stream: ResponseStream,
}

/// Why ingress refused a request.
#[derive(Debug, Error)]
pub enum IngressError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl IngressError {
    /// Whether the caller should back off and retry later.
    #[must_use]
    pub fn is_backpressure(&self) -> bool {
        matches!(self, Self::Dispatch(e) if e.is_backpressure())
    }
}

/// User-facing operations of a node.
#[derive(Clone)]
pub struct Ingress {
    container: Arc<BackboneContainer>,
}

impl Ingress {
    #[must_use]
    pub fn new(container: Arc<BackboneContainer>) -> Self {
        Self { container }
    }

    /// Queue a chat request and return its response stream.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank prompt or malformed trace id, `Dispatch` if
    /// the dispatcher refuses the envelope (overflow, duplicate id, region
    /// not served).
    pub async fn submit(&self, request: IngressRequest) -> Result<Submission, IngressError> {
        let c = &self.container;
        let trace_id = match request.trace_id {
            Some(raw) => TraceId::parse(raw)?,
            None => TraceId::generate(),
        };
        let region = request.region.unwrap_or(c.config.dispatch.default_region);
        let mut envelope = Envelope::create_with_id(
            trace_id.clone(),
            Payload::chat(request.prompt.as_str()),
            CHAT_PRIORITY,
            region,
            SecurityLevel::Internal,
        )?;

        let lookup = c
            .memory
            .search(&request.prompt, c.config.memory.results)
            .await;
        MEMORY_LOOKUPS.with_label_values(&[lookup.label()]).inc();
        if let ContextLookup::Unavailable { reason } = &lookup {
            warn!(%trace_id, %reason, "Memory unavailable, continuing without context");
            c.publish(BackboneEvent::MemoryDegraded {
                trace_id: trace_id.clone(),
                reason: reason.clone(),
            })
            .await;
        }

        let mut enrichment = Enrichment::new()
            .with_causal_stamp(c.clock.node_id(), c.clock.tick())
            .with_model(c.config.backend.generation_model.as_str())
            .with_meta("source", "ingress")
            .with_meta("context", lookup.label());
        if let Some(context) = lookup.as_context() {
            enrichment = enrichment.with_context(context);
        }
        envelope.enrich(enrichment)?;
        envelope.seal(c.signer.as_ref())?;

        let (sink, stream) = response_channel(c.config.relay.buffer);
        if !c.sinks.try_insert(&trace_id, sink) {
            let error = DispatchError::Duplicate {
                trace_id: trace_id.clone(),
            };
            self.rejected(&trace_id, &error).await;
            return Err(error.into());
        }

        if let Err(error) = self.enqueue(envelope).await {
            c.sinks.take(&trace_id);
            return Err(error.into());
        }

        info!(%trace_id, %region, context = lookup.label(), "Chat request queued");
        Ok(Submission { trace_id, stream })
    }

    /// Queue a memory write (`add_memory`). Returns the write's trace id.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank id or text, `Dispatch` if the envelope is
    /// refused.
    pub async fn remember(
        &self,
        id: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<TraceId, IngressError> {
        let c = &self.container;
        let mut envelope = Envelope::create(
            Payload::memory_upsert(id, text),
            MEMORY_WRITE_PRIORITY,
            c.config.dispatch.default_region,
            SecurityLevel::Internal,
        )?;
        envelope.enrich(
            Enrichment::new()
                .with_causal_stamp(c.clock.node_id(), c.clock.tick())
                .with_meta("source", "ingress"),
        )?;
        envelope.seal(c.signer.as_ref())?;

        let trace_id = envelope.trace_id().clone();
        self.enqueue(envelope).await?;
        info!(%trace_id, "Memory write queued");
        Ok(trace_id)
    }

    /// Cancel a queued or running request. Returns whether anything was
    /// signalled.
    pub async fn cancel(&self, trace_id: &TraceId) -> bool {
        self.container.request_cancel(trace_id).await
    }

    async fn enqueue(&self, envelope: Envelope) -> Result<(), DispatchError> {
        let c = &self.container;
        let trace_id = envelope.trace_id().clone();
        let region = envelope.target_region();
        let priority = envelope.priority().value();
        let kind = envelope.payload().kind();

        match c.dispatcher.enqueue(envelope) {
            Ok(()) => {
                ENVELOPES_ENQUEUED
                    .with_label_values(&[region.as_str(), kind])
                    .inc();
                QUEUE_DEPTH
                    .with_label_values(&[region.as_str()])
                    .set(c.dispatcher.depth(region) as i64);
                c.publish(BackboneEvent::EnvelopeQueued {
                    trace_id,
                    region,
                    priority,
                    kind: kind.to_string(),
                })
                .await;
                Ok(())
            }
            Err(error) => {
                self.rejected(&trace_id, &error).await;
                Err(error)
            }
        }
    }

    async fn rejected(&self, trace_id: &TraceId, error: &DispatchError) {
        warn!(%trace_id, %error, "Envelope rejected");
        ENVELOPES_REJECTED
            .with_label_values(&[rejection_reason(error)])
            .inc();
        self.container
            .publish(BackboneEvent::EnvelopeRejected {
                trace_id: trace_id.clone(),
                reason: error.to_string(),
            })
            .await;
    }
}

fn rejection_reason(error: &DispatchError) -> &'static str {
    match error {
        DispatchError::QueueOverflow { .. } => "overflow",
        DispatchError::Duplicate { .. } => "duplicate",
        DispatchError::RegionNotServed { .. } => "region_not_served",
        DispatchError::NotSealed { .. } => "not_sealed",
        DispatchError::ShutDown => "shut_down",
        DispatchError::InvalidConfig(_) => "invalid_config",
    }
}
