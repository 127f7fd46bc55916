//! Prometheus metrics for the backbone subsystems.
//!
//! All metrics follow the naming convention: `bb_<subsystem>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec,
    IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // DISPATCHER METRICS (Subsystem 3)
    // =========================================================================

    /// Envelopes accepted into a region queue
    pub static ref ENVELOPES_ENQUEUED: IntCounterVec = IntCounterVec::new(
        Opts::new("bb_dispatch_envelopes_enqueued_total", "Envelopes accepted into a region queue"),
        &["region", "kind"]
    ).expect("metric creation failed");

    /// Envelopes refused at enqueue
    pub static ref ENVELOPES_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("bb_dispatch_envelopes_rejected_total", "Envelopes refused at enqueue"),
        &["reason"]  // reason: overflow/duplicate/region_not_served/not_sealed/shut_down
    ).expect("metric creation failed");

    /// Current queue depth per region
    pub static ref QUEUE_DEPTH: IntGaugeVec = IntGaugeVec::new(
        Opts::new("bb_dispatch_queue_depth", "Envelopes waiting per region"),
        &["region"]
    ).expect("metric creation failed");

    // =========================================================================
    // STREAM RELAY METRICS (Subsystem 4)
    // =========================================================================

    /// Streams by terminal state
    pub static ref STREAMS_TERMINATED: IntCounterVec = IntCounterVec::new(
        Opts::new("bb_relay_streams_terminated_total", "Streams by terminal state"),
        &["outcome"]  // outcome: completed/cancelled/failed
    ).expect("metric creation failed");

    /// Tokens forwarded to callers
    pub static ref TOKENS_RELAYED: IntCounter = IntCounter::new(
        "bb_relay_tokens_total",
        "Tokens forwarded to callers"
    ).expect("metric creation failed");

    /// Wall time from dequeue to terminal state
    pub static ref STREAM_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "bb_relay_stream_duration_seconds",
            "Time from dequeue to terminal state"
        ).buckets(exponential_buckets(0.01, 2.0, 14).expect("bucket layout"))
    ).expect("metric creation failed");

    // =========================================================================
    // MEMORY GATEWAY METRICS (Subsystem 2)
    // =========================================================================

    /// Context lookups by outcome
    pub static ref MEMORY_LOOKUPS: IntCounterVec = IntCounterVec::new(
        Opts::new("bb_memory_lookups_total", "Context lookups by outcome"),
        &["outcome"]  // outcome: found/none/degraded
    ).expect("metric creation failed");

    /// Concurrent memory writes settled by the conflict resolver
    pub static ref MEMORY_CONFLICTS: IntCounter = IntCounter::new(
        "bb_memory_conflicts_resolved_total",
        "Concurrent memory writes settled by the conflict resolver"
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry. Calling it again is a
/// no-op.
///
/// # Errors
///
/// `TelemetryError::MetricsInit` if the registry rejects a collector for
/// any reason other than it already being registered.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Dispatcher
        Box::new(ENVELOPES_ENQUEUED.clone()),
        Box::new(ENVELOPES_REJECTED.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        // Relay
        Box::new(STREAMS_TERMINATED.clone()),
        Box::new(TOKENS_RELAYED.clone()),
        Box::new(STREAM_DURATION.clone()),
        // Memory
        Box::new(MEMORY_LOOKUPS.clone()),
        Box::new(MEMORY_CONFLICTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
///
/// # Errors
///
/// `TelemetryError::MetricsInit` if encoding fails.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    #[must_use]
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
