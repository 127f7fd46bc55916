//! # Inference Backbone Node
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging + metrics)
//! 2. Load configuration from the environment
//! 3. Validate it for production (sealing secret must be set)
//! 4. Build the container and start region worker pools
//! 5. Run until Ctrl+C, then shut down

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use backbone_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use node_runtime::{BackboneContainer, NodeConfig, NodeRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry =
        init_telemetry(TelemetryConfig::from_env()).context("Failed to initialize telemetry")?;

    let config = NodeConfig::from_env().context("Failed to load configuration")?;
    config
        .validate_for_production()
        .context("Configuration is not fit for production")?;

    info!(
        node_id = %config.node.node_id,
        backend = %config.backend.url,
        model = %config.backend.generation_model,
        "Starting inference backbone node"
    );

    let container = Arc::new(BackboneContainer::new(config)?);
    let runtime = NodeRuntime::new(container);
    runtime.start();

    let health = serde_json::to_string(&runtime.health())?;
    info!(%health, "Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    let abandoned = runtime.shutdown().await;
    let metrics = encode_metrics().context("Failed to encode metrics")?;
    info!(abandoned, %metrics, "Final metrics");
    Ok(())
}
