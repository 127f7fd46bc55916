//! Caller sinks awaiting dispatch.
//!
//! Ingress parks the sending half of a caller's response channel here
//! until a region worker picks the envelope up and hands it to the relay.

use bb_04_stream_relay::StreamEvent;
use parking_lot::Mutex;
use shared_types::TraceId;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Pending caller channels keyed by trace id.
#[derive(Debug, Default)]
pub struct CallerSinks {
    sinks: Mutex<HashMap<TraceId, mpsc::Sender<StreamEvent>>>,
}

impl CallerSinks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `sink` for `trace_id`. Returns false, leaving the existing
    /// sink untouched, if one is already parked.
    pub fn try_insert(&self, trace_id: &TraceId, sink: mpsc::Sender<StreamEvent>) -> bool {
        let mut sinks = self.sinks.lock();
        if sinks.contains_key(trace_id) {
            return false;
        }
        sinks.insert(trace_id.clone(), sink);
        true
    }

    /// Take the parked sink, if any.
    pub fn take(&self, trace_id: &TraceId) -> Option<mpsc::Sender<StreamEvent>> {
        self.sinks.lock().remove(trace_id)
    }

    /// Take every parked sink.
    pub fn drain(&self) -> Vec<(TraceId, mpsc::Sender<StreamEvent>)> {
        self.sinks.lock().drain().collect()
    }

    pub fn len(&self) -> usize {
        self.sinks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.lock().is_empty()
    }
}
