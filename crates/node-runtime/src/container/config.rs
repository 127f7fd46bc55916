//! # Node Configuration
//!
//! Unified configuration for all subsystems and runtime parameters.
//!
//! ## Security Requirements
//!
//! - `hmac_secret` MUST NOT be the default zero value in production
//! - All timeouts and limits have sane defaults with override capability

use bb_03_dispatcher::DispatcherConfig;
use bb_04_stream_relay::RelayConfig;
use shared_types::Region;
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    /// Node identity.
    pub node: NodeIdentityConfig,
    /// Generation and embedding backend.
    pub backend: BackendConfig,
    /// Security configuration.
    pub security: SecurityConfig,
    /// Queues and worker pools.
    pub dispatch: DispatchConfig,
    /// Token relay.
    pub relay: StreamConfig,
    /// Context retrieval.
    pub memory: MemoryConfig,
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// HMAC secret is not set (zero value).
    #[error(
        "SECURITY VIOLATION: HMAC secret is default zero value. \
         Set BB_HMAC_SECRET environment variable or provide in config."
    )]
    InsecureHmacSecret,

    /// An environment variable could not be parsed.
    #[error("{var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },

    /// A structurally unusable configuration.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn invalid(var: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        var,
        reason: reason.into(),
    }
}

impl NodeConfig {
    /// Load configuration from environment variables over the defaults.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` naming the first variable that does not
    /// parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    ///
    /// # Errors
    ///
    /// As [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(node_id) = lookup("BB_NODE_ID") {
            config.node.node_id = node_id;
        }
        if let Some(url) = lookup("BB_BACKEND_URL") {
            config.backend.url = url;
        }
        if let Some(model) = lookup("BB_GENERATION_MODEL") {
            config.backend.generation_model = model;
        }
        if let Some(model) = lookup("BB_EMBEDDING_MODEL") {
            config.backend.embedding_model = model;
        }
        if let Some(secs) = parse_var(&lookup, "BB_REQUEST_TIMEOUT_SECS")? {
            config.backend.request_timeout = Duration::from_secs(secs);
        }

        if let Some(secret_hex) = lookup("BB_HMAC_SECRET") {
            let bytes = hex::decode(secret_hex.trim())
                .map_err(|e| invalid("BB_HMAC_SECRET", e.to_string()))?;
            config.security.hmac_secret = bytes
                .try_into()
                .map_err(|_| invalid("BB_HMAC_SECRET", "must be 32 bytes (64 hex chars)"))?;
        }

        if let Some(raw) = lookup("BB_REGION_WORKERS") {
            config.dispatch.region_workers = parse_region_workers(&raw)?;
        }
        if let Some(raw) = lookup("BB_DEFAULT_REGION") {
            config.dispatch.default_region = raw
                .parse()
                .map_err(|e: shared_types::ValidationError| invalid("BB_DEFAULT_REGION", e.to_string()))?;
        }
        if let Some(bound) = parse_var(&lookup, "BB_QUEUE_BOUND")? {
            config.dispatch.queue_bound = bound;
        }
        if let Some(ms) = parse_var(&lookup, "BB_AGING_THRESHOLD_MS")? {
            config.dispatch.aging_threshold = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var(&lookup, "BB_OWNERSHIP_TTL_SECS")? {
            config.dispatch.ownership_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "BB_SHUTDOWN_GRACE_SECS")? {
            config.dispatch.shutdown_grace = Duration::from_secs(secs);
        }

        if let Some(ms) = parse_var(&lookup, "BB_FIRST_TOKEN_TIMEOUT_MS")? {
            config.relay.first_token_timeout = Duration::from_millis(ms);
        }
        if let Some(buffer) = parse_var(&lookup, "BB_RELAY_BUFFER")? {
            config.relay.buffer = buffer;
        }

        if let Some(k) = parse_var(&lookup, "BB_MEMORY_RESULTS")? {
            config.memory.results = k;
        }

        Ok(config)
    }

    /// Reject configurations the node cannot run with.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.node_id.trim().is_empty() {
            return Err(ConfigError::Invalid("node id must not be empty".into()));
        }
        if self.dispatch.queue_bound == 0 {
            return Err(ConfigError::Invalid("queue bound must be at least 1".into()));
        }
        if self.dispatch.region_workers.is_empty() {
            return Err(ConfigError::Invalid("no region is served".into()));
        }
        if let Some((region, _)) = self
            .dispatch
            .region_workers
            .iter()
            .find(|(_, workers)| **workers == 0)
        {
            return Err(ConfigError::Invalid(format!(
                "region {region} has zero workers"
            )));
        }
        if !self
            .dispatch
            .region_workers
            .contains_key(&self.dispatch.default_region)
        {
            return Err(ConfigError::Invalid(format!(
                "default region {} has no workers",
                self.dispatch.default_region
            )));
        }
        if self.relay.buffer == 0 {
            return Err(ConfigError::Invalid("relay buffer must be at least 1".into()));
        }
        Ok(())
    }

    /// Validate configuration for production readiness.
    ///
    /// # Errors
    ///
    /// Everything [`validate`](Self::validate) rejects, plus the default
    /// zero HMAC secret.
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.security.hmac_secret == [0u8; 32] {
            return Err(ConfigError::InsecureHmacSecret);
        }
        Ok(())
    }

    /// Dispatcher settings derived from this configuration.
    #[must_use]
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            queue_bound: self.dispatch.queue_bound,
            aging_threshold: self.dispatch.aging_threshold,
            ownership_ttl: self.dispatch.ownership_ttl,
            regions: self.served_regions(),
        }
    }

    /// Relay settings derived from this configuration.
    #[must_use]
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            first_token_timeout: self.relay.first_token_timeout,
            default_model: self.backend.generation_model.clone(),
        }
    }

    #[must_use]
    pub fn served_regions(&self) -> BTreeSet<Region> {
        self.dispatch.region_workers.keys().copied().collect()
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| invalid(var, e.to_string())),
    }
}

/// Parse `region=count` pairs, e.g. `eu-west=4,local-yemen=2`.
fn parse_region_workers(raw: &str) -> Result<BTreeMap<Region, usize>, ConfigError> {
    const VAR: &str = "BB_REGION_WORKERS";
    let mut workers = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, count) = pair
            .split_once('=')
            .ok_or_else(|| invalid(VAR, format!("expected region=count, got '{pair}'")))?;
        let region: Region = name
            .parse()
            .map_err(|e: shared_types::ValidationError| invalid(VAR, e.to_string()))?;
        let count: usize = count
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| invalid(VAR, format!("{pair}: {e}")))?;
        workers.insert(region, count);
    }
    Ok(workers)
}

/// Node identity.
#[derive(Debug, Clone)]
pub struct NodeIdentityConfig {
    /// This node's entry in vector clocks.
    pub node_id: String,
}

impl Default for NodeIdentityConfig {
    fn default() -> Self {
        Self {
            node_id: "node-1".to_string(),
        }
    }
}

/// Generation and embedding backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL shared by the generation and embedding endpoints.
    pub url: String,
    pub generation_model: String,
    pub embedding_model: String,
    /// Bound on embedding calls and on connecting to the backend.
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            generation_model: "llama3".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Security configuration.
#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    /// Envelope sealing secret (32 bytes).
    /// MUST NOT be default in production.
    pub hmac_secret: [u8; 32],
}

/// Queues and worker pools.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Worker count per served region.
    pub region_workers: BTreeMap<Region, usize>,
    /// Region used for ingress traffic.
    pub default_region: Region,
    pub queue_bound: usize,
    pub aging_threshold: Duration,
    pub ownership_ttl: Duration,
    /// How long shutdown waits for in-flight work.
    pub shutdown_grace: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            region_workers: BTreeMap::from([(Region::Local, 2)]),
            default_region: Region::Local,
            queue_bound: 1024,
            aging_threshold: Duration::from_millis(5000),
            ownership_ttl: Duration::from_secs(300),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Token relay.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub first_token_timeout: Duration,
    /// Caller channel capacity.
    pub buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            first_token_timeout: Duration::from_millis(30_000),
            buffer: 64,
        }
    }
}

/// Context retrieval.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Nearest neighbours folded into a prompt.
    pub results: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { results: 1 }
    }
}
