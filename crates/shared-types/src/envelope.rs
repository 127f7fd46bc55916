//! # Envelope
//!
//! The universal wrapper for ALL traffic moving through the backbone.
//!
//! ## Lifecycle
//!
//! ```text
//! create ──→ [UNSEALED] ──enrich*──→ [UNSEALED] ──seal──→ [SEALED]
//!                                                            │
//!                  dispatch ──→ consume (one worker) ──→ retire
//! ```
//!
//! ## Security Properties
//!
//! - **Immutable After Seal**: `enrich` on a sealed envelope fails with
//!   `EnvelopeError::Sealed` and leaves every field untouched.
//! - **Seal Exactly Once**: a second `seal` fails with
//!   `EnvelopeError::AlreadySealed`; re-signing is never silently accepted.
//! - **Identity by Trace Id**: equality and hashing use `trace_id` alone.

use crate::clock::VectorClock;
use crate::entities::{
    current_timestamp, Payload, Priority, Region, SecurityLevel, TraceId,
};
use crate::errors::{EnvelopeError, ValidationError};
use crate::security::EnvelopeSigner;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Canonical envelope record.
///
/// Fields are private: reads go through accessors, writes through
/// [`Envelope::enrich`] (before sealing) and nothing afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    // =========================================================================
    // IDENTITY & TRACING
    // =========================================================================
    /// Assigned once at creation.
    trace_id: TraceId,

    /// Wall-clock creation time (seconds). Informational only.
    timestamp: f64,

    // =========================================================================
    // CAUSALITY
    // =========================================================================
    /// Node that stamped this envelope's vector clock.
    #[serde(default)]
    origin_node: String,

    #[serde(default)]
    vector_clock: VectorClock,

    // =========================================================================
    // ROUTING
    // =========================================================================
    priority: Priority,

    #[serde(default)]
    target_region: Region,

    // =========================================================================
    // PAYLOAD
    // =========================================================================
    payload: Payload,

    // =========================================================================
    // SECURITY & GOVERNANCE
    // =========================================================================
    #[serde(default)]
    security_level: SecurityLevel,

    /// Set exactly once by `seal`.
    #[serde(default)]
    hmac_signature: Option<String>,

    // =========================================================================
    // OBSERVABILITY
    // =========================================================================
    /// Cost, latency, model version. Not covered by the signature.
    #[serde(default)]
    meta: BTreeMap<String, Value>,
}

/// Fixed-order view serialized for signing.
#[derive(Serialize)]
struct CanonicalView<'a> {
    trace_id: &'a TraceId,
    timestamp: f64,
    origin_node: &'a str,
    vector_clock: &'a VectorClock,
    priority: Priority,
    target_region: Region,
    payload: &'a Payload,
    security_level: SecurityLevel,
}

impl Envelope {
    /// Create an unsealed envelope with a fresh trace id.
    ///
    /// # Errors
    ///
    /// `ValidationError` if `priority` is outside `0..=10` or the payload is
    /// malformed.
    pub fn create(
        payload: Payload,
        priority: i64,
        target_region: Region,
        security_level: SecurityLevel,
    ) -> Result<Self, ValidationError> {
        Self::create_with_id(
            TraceId::generate(),
            payload,
            priority,
            target_region,
            security_level,
        )
    }

    /// Create an unsealed envelope for a caller-supplied trace id.
    ///
    /// # Errors
    ///
    /// Same as [`Envelope::create`].
    pub fn create_with_id(
        trace_id: TraceId,
        payload: Payload,
        priority: i64,
        target_region: Region,
        security_level: SecurityLevel,
    ) -> Result<Self, ValidationError> {
        let priority = Priority::new(priority)?;
        payload.validate()?;

        Ok(Self {
            trace_id,
            timestamp: current_timestamp(),
            origin_node: String::new(),
            vector_clock: VectorClock::new(),
            priority,
            target_region,
            payload,
            security_level,
            hmac_signature: None,
            meta: BTreeMap::new(),
        })
    }

    /// Decode an envelope from its JSON wire shape and validate it.
    ///
    /// # Errors
    ///
    /// `EnvelopeError::Serialization` for undecodable input (including an
    /// out-of-range priority), `EnvelopeError::Validation` for a malformed
    /// payload.
    pub fn from_wire(json: &str) -> Result<Self, EnvelopeError> {
        let envelope: Envelope =
            serde_json::from_str(json).map_err(|e| EnvelopeError::Serialization(e.to_string()))?;
        envelope.payload.validate()?;
        Ok(envelope)
    }

    /// Encode the envelope in its JSON wire shape.
    ///
    /// # Errors
    ///
    /// `EnvelopeError::Serialization` if a meta value cannot be encoded.
    pub fn to_wire(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(|e| EnvelopeError::Serialization(e.to_string()))
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Apply pre-seal changes.
    ///
    /// All checks run before any field is touched, so a failed call leaves
    /// the envelope unchanged.
    ///
    /// # Errors
    ///
    /// - `EnvelopeError::Sealed` if the envelope is already sealed
    /// - `ValidationError::ContextNotApplicable` for context on a
    ///   non-generation payload
    pub fn enrich(&mut self, enrichment: Enrichment) -> Result<(), EnvelopeError> {
        if self.is_sealed() {
            return Err(EnvelopeError::Sealed {
                trace_id: self.trace_id.clone(),
            });
        }

        let Enrichment {
            context,
            model,
            meta,
            causal_stamp,
        } = enrichment;

        let wants_payload_change = context.is_some() || model.is_some();
        if wants_payload_change && !matches!(self.payload, Payload::ChatCompletion { .. }) {
            return Err(ValidationError::ContextNotApplicable {
                kind: self.payload.kind(),
            }
            .into());
        }
        if model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(ValidationError::MissingField("model").into());
        }

        if let Payload::ChatCompletion {
            context: slot,
            model: model_slot,
            ..
        } = &mut self.payload
        {
            if let Some(context) = context {
                *slot = Some(context);
            }
            if let Some(model) = model {
                *model_slot = Some(model);
            }
        }

        if let Some((node, clock)) = causal_stamp {
            self.origin_node = node;
            self.vector_clock = clock;
        }

        self.meta.extend(meta);
        Ok(())
    }

    /// Sign the envelope, making it immutable.
    ///
    /// # Errors
    ///
    /// - `EnvelopeError::AlreadySealed` on a second call
    /// - `EnvelopeError::Serialization` if canonical bytes cannot be produced
    pub fn seal(&mut self, signer: &dyn EnvelopeSigner) -> Result<(), EnvelopeError> {
        if self.is_sealed() {
            return Err(EnvelopeError::AlreadySealed {
                trace_id: self.trace_id.clone(),
            });
        }
        let canonical = self.canonical_bytes()?;
        self.hmac_signature = Some(signer.sign(&canonical));
        tracing::debug!(
            trace_id = %self.trace_id,
            algorithm = signer.algorithm(),
            "Envelope sealed"
        );
        Ok(())
    }

    /// True once `seal` has succeeded.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.hmac_signature.is_some()
    }

    /// Check the stored signature against the current canonical bytes.
    ///
    /// Unsealed envelopes never verify.
    #[must_use]
    pub fn verify(&self, signer: &dyn EnvelopeSigner) -> bool {
        let Some(signature) = self.hmac_signature.as_deref() else {
            return false;
        };
        match self.canonical_bytes() {
            Ok(canonical) => signer.verify(&canonical, signature),
            Err(_) => false,
        }
    }

    /// Deterministic bytes covered by the signature.
    ///
    /// Compact JSON of `{trace_id, timestamp, origin_node, vector_clock,
    /// priority, target_region, payload, security_level}` in that order.
    /// `vector_clock` keys are sorted; `meta` and `hmac_signature` are
    /// excluded.
    ///
    /// # Errors
    ///
    /// `EnvelopeError::Serialization` (e.g. for a non-finite timestamp).
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        let view = CanonicalView {
            trace_id: &self.trace_id,
            timestamp: self.timestamp,
            origin_node: &self.origin_node,
            vector_clock: &self.vector_clock,
            priority: self.priority,
            target_region: self.target_region,
            payload: &self.payload,
            security_level: self.security_level,
        };
        serde_json::to_vec(&view).map_err(|e| EnvelopeError::Serialization(e.to_string()))
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn origin_node(&self) -> &str {
        &self.origin_node
    }

    pub fn vector_clock(&self) -> &VectorClock {
        &self.vector_clock
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn target_region(&self) -> Region {
        self.target_region
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    pub fn hmac_signature(&self) -> Option<&str> {
        self.hmac_signature.as_deref()
    }

    pub fn meta(&self) -> &BTreeMap<String, Value> {
        &self.meta
    }
}

impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        self.trace_id == other.trace_id
    }
}

impl Eq for Envelope {}

impl Hash for Envelope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.trace_id.hash(state);
    }
}

/// Pre-seal changes applied atomically by [`Envelope::enrich`].
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    context: Option<String>,
    model: Option<String>,
    meta: Vec<(String, Value)>,
    causal_stamp: Option<(String, VectorClock)>,
}

impl Enrichment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold retrieved memory into a generation payload.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Pin the generation model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add an observability entry.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.push((key.into(), value.into()));
        self
    }

    /// Record the originating node and its clock snapshot.
    #[must_use]
    pub fn with_causal_stamp(mut self, node: impl Into<String>, clock: VectorClock) -> Self {
        self.causal_stamp = Some((node.into(), clock));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::HmacSigner;

    fn signer() -> HmacSigner {
        HmacSigner::new(&[0x42; 32]).unwrap()
    }

    fn chat(priority: i64) -> Envelope {
        Envelope::create(
            Payload::chat("Explain X"),
            priority,
            Region::Local,
            SecurityLevel::Internal,
        )
        .unwrap()
    }

    #[test]
    fn test_create_rejects_out_of_range_priority() {
        let err = Envelope::create(Payload::chat("p"), 11, Region::Local, SecurityLevel::Public)
            .unwrap_err();
        assert_eq!(err, ValidationError::PriorityOutOfRange { value: 11 });
    }

    #[test]
    fn test_create_rejects_blank_prompt() {
        let err = Envelope::create(Payload::chat(""), 5, Region::Local, SecurityLevel::Public)
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("prompt"));
    }

    #[test]
    fn test_create_assigns_unsealed_identity() {
        let env = chat(10);
        assert!(!env.is_sealed());
        assert!(env.timestamp() > 0.0);
        assert!(env.vector_clock().is_empty());
        assert_eq!(env.priority(), Priority::CRITICAL);
    }

    #[test]
    fn test_enrich_before_seal() {
        let mut env = chat(10);
        let clock: VectorClock = [("node-1", 1)].into_iter().collect();
        env.enrich(
            Enrichment::new()
                .with_context("User runs Debian")
                .with_meta("source", "ingress")
                .with_causal_stamp("node-1", clock.clone()),
        )
        .unwrap();

        assert_eq!(env.meta()["source"], "ingress");
        assert_eq!(env.origin_node(), "node-1");
        assert_eq!(env.vector_clock(), &clock);
        assert!(env
            .payload()
            .render_prompt()
            .unwrap()
            .starts_with("Context: User runs Debian"));
    }

    #[test]
    fn test_enrich_context_on_memory_payload_rejected() {
        let mut env = Envelope::create(
            Payload::memory_upsert("fact-1", "text"),
            1,
            Region::Local,
            SecurityLevel::Internal,
        )
        .unwrap();
        let err = env
            .enrich(Enrichment::new().with_context("ctx").with_meta("k", 1))
            .unwrap_err();
        assert!(matches!(
            err,
            EnvelopeError::Validation(ValidationError::ContextNotApplicable { .. })
        ));
        // Failed enrichment is atomic
        assert!(env.meta().is_empty());
    }

    #[test]
    fn test_sealed_envelope_rejects_enrich_and_stays_identical() {
        let mut env = chat(10);
        env.seal(&signer()).unwrap();
        let before = env.to_wire().unwrap();

        let err = env
            .enrich(Enrichment::new().with_meta("cost", 0.1).with_context("late"))
            .unwrap_err();

        assert!(matches!(err, EnvelopeError::Sealed { .. }));
        assert_eq!(env.to_wire().unwrap(), before);
    }

    #[test]
    fn test_second_seal_rejected() {
        let mut env = chat(3);
        env.seal(&signer()).unwrap();
        let first = env.hmac_signature().unwrap().to_string();

        let other = HmacSigner::new(b"different").unwrap();
        let err = env.seal(&other).unwrap_err();

        assert!(matches!(err, EnvelopeError::AlreadySealed { .. }));
        assert_eq!(env.hmac_signature(), Some(first.as_str()));
    }

    #[test]
    fn test_verify_detects_tampering_in_wire_form() {
        let mut env = chat(4);
        env.seal(&signer()).unwrap();
        assert!(env.verify(&signer()));

        let tampered = env.to_wire().unwrap().replace("\"priority\":4", "\"priority\":9");
        let decoded = Envelope::from_wire(&tampered).unwrap();
        assert!(!decoded.verify(&signer()));
    }

    #[test]
    fn test_sealed_envelope_verifies_after_wire_round_trip() {
        let signer = signer();
        let mut failures = Vec::new();
        for i in 0..5_000u32 {
            let mut env = chat(5);
            env.timestamp = 1_792_435_745.821_905_9 + f64::from(i) * 0.000_731_3;
            env.seal(&signer).unwrap();

            let decoded = Envelope::from_wire(&env.to_wire().unwrap()).unwrap();
            if decoded.timestamp() != env.timestamp() || !decoded.verify(&signer) {
                failures.push(env.timestamp());
            }
        }
        assert!(failures.is_empty(), "round trip broke {failures:?}");
    }

    #[test]
    fn test_live_timestamps_survive_wire_round_trip() {
        let signer = signer();
        for _ in 0..2_000 {
            let mut env = chat(5);
            env.seal(&signer).unwrap();
            let decoded = Envelope::from_wire(&env.to_wire().unwrap()).unwrap();
            assert!(decoded.verify(&signer), "timestamp {}", env.timestamp());
        }
    }

    #[test]
    fn test_meta_not_covered_by_signature() {
        let mut env = chat(4);
        env.seal(&signer()).unwrap();
        let wire = env.to_wire().unwrap();
        let mut value: Value = serde_json::from_str(&wire).unwrap();
        value["meta"]["latency_ms"] = Value::from(12);
        let decoded = Envelope::from_wire(&value.to_string()).unwrap();
        assert!(decoded.verify(&signer()));
    }

    #[test]
    fn test_unsealed_never_verifies() {
        assert!(!chat(1).verify(&signer()));
    }

    #[test]
    fn test_canonical_bytes_exclude_meta_and_signature() {
        let mut env = chat(2);
        env.enrich(Enrichment::new().with_meta("model_version", "llama3"))
            .unwrap();
        let canonical = String::from_utf8(env.canonical_bytes().unwrap()).unwrap();
        assert!(canonical.starts_with("{\"trace_id\":"));
        assert!(!canonical.contains("model_version"));
        assert!(!canonical.contains("hmac_signature"));
    }

    #[test]
    fn test_from_wire_rejects_out_of_range_priority() {
        let mut value = serde_json::to_value(chat(5)).unwrap();
        value["priority"] = Value::from(11);
        assert!(matches!(
            Envelope::from_wire(&value.to_string()),
            Err(EnvelopeError::Serialization(_))
        ));
    }

    #[test]
    fn test_equality_by_trace_id_only() {
        let a = chat(1);
        let mut b = a.clone();
        b.enrich(Enrichment::new().with_meta("x", 1)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, chat(1));
    }
}
