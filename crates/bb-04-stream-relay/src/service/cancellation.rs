//! # Cancellation Registry
//!
//! Maps a `trace_id` to a watch channel the relay polls at every token
//! boundary.
//!
//! A cancellation may arrive before the relay starts (the envelope is still
//! queued). `park` records it so that the later `register` hands the relay
//! an already-cancelled signal.

use parking_lot::Mutex;
use shared_types::TraceId;
use std::collections::HashMap;
use tokio::sync::watch;
use tracing::debug;

/// Relay-side view of one trace's cancellation flag.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancelled. Never resolves if the registry entry is
    /// dropped without cancelling.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Registry of live cancellation flags keyed by trace id.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    signals: Mutex<HashMap<TraceId, watch::Sender<bool>>>,
}

impl CancellationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal for `trace_id`, reusing a parked cancellation if present.
    pub fn register(&self, trace_id: &TraceId) -> CancelSignal {
        let mut signals = self.signals.lock();
        let sender = signals
            .entry(trace_id.clone())
            .or_insert_with(|| watch::channel(false).0);
        CancelSignal {
            rx: sender.subscribe(),
        }
    }

    /// Cancel a registered trace. Returns false if nothing is registered.
    pub fn cancel(&self, trace_id: &TraceId) -> bool {
        let signals = self.signals.lock();
        match signals.get(trace_id) {
            Some(sender) => {
                sender.send_replace(true);
                debug!(%trace_id, "Cancellation signalled");
                true
            }
            None => false,
        }
    }

    /// Cancel every registered trace. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let signals = self.signals.lock();
        for sender in signals.values() {
            sender.send_replace(true);
        }
        signals.len()
    }

    /// Record a cancellation for a trace whose relay has not started yet.
    pub fn park(&self, trace_id: &TraceId) {
        let mut signals = self.signals.lock();
        signals
            .entry(trace_id.clone())
            .or_insert_with(|| watch::channel(false).0)
            .send_replace(true);
        debug!(%trace_id, "Cancellation parked");
    }

    /// Drop a parked entry that no relay has picked up.
    ///
    /// Entries with a live signal are left for their relay's `unregister`.
    /// Returns whether an entry was removed.
    pub fn discard_parked(&self, trace_id: &TraceId) -> bool {
        let mut signals = self.signals.lock();
        let unclaimed = signals
            .get(trace_id)
            .is_some_and(|sender| sender.receiver_count() == 0);
        if unclaimed {
            signals.remove(trace_id);
            debug!(%trace_id, "Parked cancellation discarded");
        }
        unclaimed
    }

    pub fn unregister(&self, trace_id: &TraceId) {
        self.signals.lock().remove(trace_id);
    }

    pub fn contains(&self, trace_id: &TraceId) -> bool {
        self.signals.lock().contains_key(trace_id)
    }

    pub fn len(&self) -> usize {
        self.signals.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn id(s: &str) -> TraceId {
        TraceId::parse(s).unwrap()
    }

    #[test]
    fn test_cancel_unregistered_is_false() {
        let registry = CancellationRegistry::new();
        assert!(!registry.cancel(&id("nobody")));
    }

    #[test]
    fn test_cancel_flips_signal() {
        let registry = CancellationRegistry::new();
        let signal = registry.register(&id("t"));
        assert!(!signal.is_cancelled());
        assert!(registry.cancel(&id("t")));
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_parked_cancel_seen_on_register() {
        let registry = CancellationRegistry::new();
        registry.park(&id("queued"));
        assert!(registry.register(&id("queued")).is_cancelled());
    }

    #[test]
    fn test_cancel_all_flips_every_signal() {
        let registry = CancellationRegistry::new();
        let a = registry.register(&id("a"));
        let b = registry.register(&id("b"));
        assert_eq!(registry.cancel_all(), 2);
        assert!(a.is_cancelled() && b.is_cancelled());
    }

    #[test]
    fn test_unregister_removes_entry() {
        let registry = CancellationRegistry::new();
        let _signal = registry.register(&id("t"));
        registry.unregister(&id("t"));
        assert!(registry.is_empty());
        assert!(!registry.cancel(&id("t")));
    }

    #[test]
    fn test_discard_parked_keeps_claimed_entries() {
        let registry = CancellationRegistry::new();
        registry.park(&id("orphan"));
        assert!(registry.discard_parked(&id("orphan")));
        assert!(!registry.contains(&id("orphan")));

        registry.park(&id("running"));
        let signal = registry.register(&id("running"));
        assert!(!registry.discard_parked(&id("running")));
        assert!(registry.contains(&id("running")));
        drop(signal);
        assert!(registry.discard_parked(&id("running")));
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let registry = std::sync::Arc::new(CancellationRegistry::new());
        let mut signal = registry.register(&id("t"));
        let r = registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            r.cancel(&id("t"));
        });
        tokio::time::timeout(Duration::from_secs(2), signal.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_never_signal_does_not_resolve() {
        let mut signal = CancelSignal::never();
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(waited.is_err());
    }
}
