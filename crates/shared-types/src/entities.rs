//! # Core Domain Entities
//!
//! Value types carried inside the `Envelope`.
//!
//! ## Clusters
//!
//! - **Identity**: `TraceId`
//! - **Routing**: `Priority`, `Region`
//! - **Governance**: `SecurityLevel`
//! - **Content**: `Payload`, `ControlCommand`

use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Maximum accepted length of a caller-supplied trace id.
pub const MAX_TRACE_ID_LEN: usize = 128;

/// Wall-clock time in seconds since the UNIX epoch (fractional).
///
/// Informational only. Never used for causal ordering.
pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Globally unique identifier of an envelope.
///
/// Used for deduplication, ownership, and cancellation lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TraceId(String);

impl TraceId {
    /// Generate a fresh UUID-v4 trace id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a caller-supplied id.
    ///
    /// # Errors
    ///
    /// `ValidationError::InvalidTraceId` if the id is empty, longer than
    /// [`MAX_TRACE_ID_LEN`], or contains whitespace/control characters.
    pub fn parse(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.is_empty() || raw.len() > MAX_TRACE_ID_LEN {
            return Err(ValidationError::InvalidTraceId(raw));
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ValidationError::InvalidTraceId(raw));
        }
        Ok(Self(raw))
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TraceId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TraceId> for String {
    fn from(id: TraceId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ROUTING
// =============================================================================

/// Urgency of an envelope, 0 (background) through 10 (user is waiting).
///
/// Out-of-range values are rejected, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Priority(u8);

impl Priority {
    /// Lowest tier.
    pub const MIN: Priority = Priority(0);
    /// Highest tier.
    pub const MAX: Priority = Priority(10);
    /// Default tier for background traffic.
    pub const BACKGROUND: Priority = Priority(1);
    /// Tier used for interactive user requests.
    pub const CRITICAL: Priority = Priority(10);

    /// Validate a raw priority.
    ///
    /// # Errors
    ///
    /// `ValidationError::PriorityOutOfRange` if `value` is outside `0..=10`.
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if !(0..=i64::from(Self::MAX.0)).contains(&value) {
            return Err(ValidationError::PriorityOutOfRange { value });
        }
        Ok(Self(value as u8))
    }

    /// The numeric tier.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::BACKGROUND
    }
}

impl TryFrom<i64> for Priority {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> Self {
        p.0
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed set of routing targets. Each maps to an independent worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "eu-west")]
    EuWest,
    #[serde(rename = "us-east")]
    UsEast,
    #[default]
    #[serde(rename = "local-yemen")]
    Local,
}

impl Region {
    /// Every routing target.
    pub const ALL: [Region; 3] = [Region::EuWest, Region::UsEast, Region::Local];

    /// Wire name of the region.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Region::EuWest => "eu-west",
            Region::UsEast => "us-east",
            Region::Local => "local-yemen",
        }
    }
}

impl FromStr for Region {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnknownRegion(s.to_string()))
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// GOVERNANCE
// =============================================================================

/// Ordinal access-control label. Enforced by collaborators, not the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Public,
    #[default]
    Internal,
    Critical,
}

// =============================================================================
// CONTENT
// =============================================================================

/// Control messages carried on the same transport as work items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Cancel the stream identified by `trace_id`.
    Cancel { trace_id: TraceId },
}

/// Kind-tagged payload. Validated at construction so that a missing prompt
/// is an ingress error rather than a runtime surprise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// A generation request.
    ChatCompletion {
        prompt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        /// Retrieved memory folded in during enrichment.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },
    /// A semantic-memory write.
    MemoryUpsert { id: String, text: String },
    /// An internal control message.
    Control { command: ControlCommand },
}

impl Payload {
    /// Convenience constructor for a plain chat request.
    #[must_use]
    pub fn chat(prompt: impl Into<String>) -> Self {
        Payload::ChatCompletion {
            prompt: prompt.into(),
            model: None,
            context: None,
        }
    }

    /// Convenience constructor for a memory write.
    #[must_use]
    pub fn memory_upsert(id: impl Into<String>, text: impl Into<String>) -> Self {
        Payload::MemoryUpsert {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Short tag used in logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::ChatCompletion { .. } => "chat_completion",
            Payload::MemoryUpsert { .. } => "memory_upsert",
            Payload::Control { .. } => "control",
        }
    }

    /// Check payload shape.
    ///
    /// # Errors
    ///
    /// `ValidationError::MissingField` for blank prompts, ids, or texts.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Payload::ChatCompletion { prompt, model, .. } => {
                if prompt.trim().is_empty() {
                    return Err(ValidationError::MissingField("prompt"));
                }
                if model.as_deref().is_some_and(|m| m.trim().is_empty()) {
                    return Err(ValidationError::MissingField("model"));
                }
            }
            Payload::MemoryUpsert { id, text } => {
                if id.trim().is_empty() {
                    return Err(ValidationError::MissingField("id"));
                }
                if text.trim().is_empty() {
                    return Err(ValidationError::MissingField("text"));
                }
            }
            Payload::Control { .. } => {}
        }
        Ok(())
    }

    /// Prompt to send to the generation backend, with any retrieved
    /// context prepended. `None` for non-generation payloads.
    #[must_use]
    pub fn render_prompt(&self) -> Option<String> {
        match self {
            Payload::ChatCompletion {
                prompt,
                context: Some(context),
                ..
            } => Some(format!("Context: {context}\n\nUser Question: {prompt}")),
            Payload::ChatCompletion { prompt, .. } => Some(prompt.clone()),
            _ => None,
        }
    }
}
