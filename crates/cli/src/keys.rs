//! Publisher signing key handling.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ed25519_dalek::VerifyingKey;
use parley_core::{DecodedJws, Ed25519Verifier, SignatureVerifier};
use tracing::{info, warn};

/// Decode a base64url Ed25519 public key. Trailing padding is tolerated.
pub(crate) fn decode_verifying_key(encoded: &str) -> Result<VerifyingKey, String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim().trim_end_matches('='))
        .map_err(|e| format!("error decoding publisher key: {}", e))?;
    let key_bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| "invalid publisher key length: expected 32 bytes".to_string())?;
    VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| format!("invalid publisher key material: {}", e))
}

/// Short hex fingerprint of a verifying key (first 8 bytes).
pub(crate) fn key_fingerprint(key: &VerifyingKey) -> String {
    key.to_bytes()[..8]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Used when no publisher key is configured: every signature is rejected,
/// so signed content is reported instead of silently trusted.
pub(crate) struct RejectAllVerifier;

impl SignatureVerifier for RejectAllVerifier {
    fn verify(&self, _jws: &DecodedJws) -> bool {
        false
    }
}

pub(crate) fn publisher_verifier(
    encoded: Option<&str>,
) -> Result<Arc<dyn SignatureVerifier>, String> {
    match encoded {
        Some(encoded) => {
            let key = decode_verifying_key(encoded)?;
            info!(fingerprint = %key_fingerprint(&key), "publisher key loaded");
            Ok(Arc::new(Ed25519Verifier::new(key)))
        }
        None => {
            warn!("no publisher key given; signed content will not verify");
            Ok(Arc::new(RejectAllVerifier))
        }
    }
}
