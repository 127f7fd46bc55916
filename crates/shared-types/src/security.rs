//! # Envelope Sealing
//!
//! The **single, authoritative implementation** of the sealing contract.
//!
//! ## Security Properties
//!
//! - **HMAC-SHA256 Signatures**: computed over the envelope's canonical bytes
//! - **Canonical Form**: compact JSON of a fixed-order record; `meta` and the
//!   signature itself are excluded (see `Envelope::canonical_bytes`)
//! - **Constant-Time Verification**: `verify_slice` comparison
//! - **Seal Once**: enforced by `Envelope::seal`, not by the signer

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Errors building a signer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The MAC rejected the key material.
    #[error("Invalid signing key length")]
    InvalidLength,
}

/// Computes and checks envelope signatures.
///
/// Implementations might:
/// - Use a shared secret from configuration (`HmacSigner`)
/// - Delegate to a key management service
pub trait EnvelopeSigner: Send + Sync {
    /// Short algorithm label recorded in logs.
    fn algorithm(&self) -> &'static str;

    /// Sign canonical bytes, returning the encoded signature.
    fn sign(&self, canonical: &[u8]) -> String;

    /// Verify an encoded signature against canonical bytes.
    fn verify(&self, canonical: &[u8], signature: &str) -> bool;
}

/// HMAC-SHA256 signer over a pre-shared secret. Signatures are lowercase hex.
#[derive(Clone)]
pub struct HmacSigner {
    /// Keyed MAC, cloned per operation.
    mac: HmacSha256,
}

impl HmacSigner {
    /// Build a signer from raw key material.
    ///
    /// # Errors
    ///
    /// `KeyError::InvalidLength` if the MAC rejects the key.
    pub fn new(secret: &[u8]) -> Result<Self, KeyError> {
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| KeyError::InvalidLength)?;
        Ok(Self { mac })
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

impl EnvelopeSigner for HmacSigner {
    fn algorithm(&self) -> &'static str {
        "hmac-sha256"
    }

    fn sign(&self, canonical: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(canonical);
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify(&self, canonical: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(canonical);
        // Constant-time comparison
        mac.verify_slice(&expected).is_ok()
    }
}
