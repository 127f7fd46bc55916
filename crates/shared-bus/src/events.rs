//! # Backbone Events
//!
//! Lifecycle events published by the runtime as envelopes move through
//! dispatch, relay and memory. Observers subscribe by topic; nothing on the
//! request path waits for a subscriber.

use serde::{Deserialize, Serialize};
use shared_types::{Region, TraceId};

/// How a relayed stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamOutcome {
    Completed,
    Cancelled,
    Failed,
}

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BackboneEvent {
    // =========================================================================
    // SUBSYSTEM 3: DISPATCHER
    // =========================================================================
    /// A sealed envelope was accepted into a region queue.
    EnvelopeQueued {
        trace_id: TraceId,
        region: Region,
        priority: u8,
        kind: String,
    },

    /// Enqueue was refused (overflow, duplicate, unserved region, ...).
    EnvelopeRejected { trace_id: TraceId, reason: String },

    /// A worker took the envelope off its region queue.
    EnvelopeDispatched {
        trace_id: TraceId,
        region: Region,
        worker: usize,
    },

    // =========================================================================
    // SUBSYSTEM 4: STREAM RELAY
    // =========================================================================
    /// A generation stream is about to open.
    StreamStarted { trace_id: TraceId, region: Region },

    /// A stream reached its single terminal state.
    StreamFinished {
        trace_id: TraceId,
        outcome: StreamOutcome,
        tokens: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A cancellation was requested.
    /// `parked` is true when the stream had not started yet.
    CancelRequested { trace_id: TraceId, parked: bool },

    // =========================================================================
    // SUBSYSTEM 2: MEMORY GATEWAY
    // =========================================================================
    /// A memory write was applied (`inserted`, `replaced`, `stale`,
    /// `conflict_resolved`).
    MemoryWritten { key: String, outcome: String },

    /// Retrieval failed and the request continued without context.
    MemoryDegraded { trace_id: TraceId, reason: String },

    // =========================================================================
    // RUNTIME
    // =========================================================================
    /// The node is shutting down. `abandoned` envelopes were still queued.
    ShuttingDown { abandoned: usize },
}

impl BackboneEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::EnvelopeQueued { .. }
            | Self::EnvelopeRejected { .. }
            | Self::EnvelopeDispatched { .. } => EventTopic::Dispatch,
            Self::StreamStarted { .. } | Self::StreamFinished { .. } => EventTopic::Stream,
            Self::CancelRequested { .. } => EventTopic::Control,
            Self::MemoryWritten { .. } | Self::MemoryDegraded { .. } => EventTopic::Memory,
            Self::ShuttingDown { .. } => EventTopic::System,
        }
    }

    /// Get the originating subsystem ID (0 is the runtime itself).
    #[must_use]
    pub fn source_subsystem(&self) -> u8 {
        match self.topic() {
            EventTopic::Memory => 2,
            EventTopic::Dispatch => 3,
            EventTopic::Stream | EventTopic::Control => 4,
            EventTopic::System | EventTopic::All => 0,
        }
    }

    /// Trace the event refers to, if any.
    #[must_use]
    pub fn trace_id(&self) -> Option<&TraceId> {
        match self {
            Self::EnvelopeQueued { trace_id, .. }
            | Self::EnvelopeRejected { trace_id, .. }
            | Self::EnvelopeDispatched { trace_id, .. }
            | Self::StreamStarted { trace_id, .. }
            | Self::StreamFinished { trace_id, .. }
            | Self::CancelRequested { trace_id, .. }
            | Self::MemoryDegraded { trace_id, .. } => Some(trace_id),
            Self::MemoryWritten { .. } | Self::ShuttingDown { .. } => None,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Subsystem 2 events.
    Memory,
    /// Subsystem 3 events.
    Dispatch,
    /// Subsystem 4 stream lifecycle.
    Stream,
    /// Cancellation requests.
    Control,
    /// Node lifecycle.
    System,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Restrict to one trace. `None` means every trace.
    pub trace_id: Option<TraceId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            trace_id: None,
        }
    }

    /// Create a filter following a single trace.
    #[must_use]
    pub fn for_trace(trace_id: TraceId) -> Self {
        Self {
            topics: Vec::new(),
            trace_id: Some(trace_id),
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &BackboneEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let trace_match = match &self.trace_id {
            None => true,
            Some(wanted) => event.trace_id() == Some(wanted),
        };

        topic_match && trace_match
    }
}
