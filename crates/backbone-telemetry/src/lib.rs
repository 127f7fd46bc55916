//! # Backbone Telemetry
//!
//! Structured logging and Prometheus metrics for the node runtime.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use backbone_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_telemetry(TelemetryConfig::from_env())?;
//!     // Logs and metrics are now being collected
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BB_SERVICE_NAME` | `inference-backbone` | Service name in logs |
//! | `BB_LOG_LEVEL` | `info` | Log filter (falls back to `RUST_LOG`) |
//! | `BB_JSON_LOGS` | off, on in containers | JSON lines output |
//! | `BB_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::build_filter;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, ENVELOPES_ENQUEUED, ENVELOPES_REJECTED,
    MEMORY_CONFLICTS, MEMORY_LOOKUPS, QUEUE_DEPTH, STREAMS_TERMINATED, STREAM_DURATION,
    TOKENS_RELAYED,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics and install the global log subscriber.
///
/// Returns a guard that must be held for the lifetime of the application.
///
/// # Errors
///
/// Fails if the log filter does not parse, a subscriber is already
/// installed, or metric registration fails.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    logging::init_logging(&config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active.
#[derive(Debug)]
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
