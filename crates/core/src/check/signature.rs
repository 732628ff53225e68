use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde_json::{json, Value};

use super::content::JsonRule;
use super::{render_pointer, CheckResult};

/// Why a string is not a usable compact JWS.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JwsError {
    #[error("expected 3 dot-separated parts, found {0}")]
    Shape(usize),

    #[error("{part} is not valid base64url: {reason}")]
    Encoding { part: &'static str, reason: String },

    #[error("protected header is not a JSON object: {0}")]
    Header(String),
}

/// A compact JWS split into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedJws {
    pub header: Value,
    pub payload: Vec<u8>,
    /// `<header>.<payload>` exactly as received; the signed bytes.
    pub signing_input: String,
    pub signature: Vec<u8>,
}

impl DecodedJws {
    pub fn algorithm(&self) -> Option<&str> {
        self.header.get("alg").and_then(Value::as_str)
    }

    pub fn is_unsigned(&self) -> bool {
        self.algorithm()
            .is_none_or(|alg| alg.eq_ignore_ascii_case("none"))
    }
}

pub fn decode_compact_jws(token: &str) -> Result<DecodedJws, JwsError> {
    let parts: Vec<&str> = token.split('.').collect();
    let &[header, payload, signature] = parts.as_slice() else {
        return Err(JwsError::Shape(parts.len()));
    };
    let decode = |part: &'static str, text: &str| {
        BASE64URL.decode(text).map_err(|e| JwsError::Encoding {
            part,
            reason: e.to_string(),
        })
    };
    let header_bytes = decode("header", header)?;
    let header_json: Value = serde_json::from_slice(&header_bytes)
        .map_err(|e| JwsError::Header(e.to_string()))?;
    if !header_json.is_object() {
        return Err(JwsError::Header(header_json.to_string()));
    }
    Ok(DecodedJws {
        header: header_json,
        payload: decode("payload", payload)?,
        signing_input: format!("{header}.{payload}"),
        signature: decode("signature", signature)?,
    })
}

/// Produce an `EdDSA` compact JWS over the JSON `payload`.
pub fn sign_compact_jws(payload: &Value, key: &SigningKey) -> String {
    let header = BASE64URL.encode(json!({"alg": "EdDSA"}).to_string());
    let body = BASE64URL.encode(payload.to_string());
    let signing_input = format!("{header}.{body}");
    let signature = key.sign(signing_input.as_bytes());
    format!("{signing_input}.{}", BASE64URL.encode(signature.to_bytes()))
}

/// Decides whether a JWS was signed by the expected party.
///
/// Cryptography stays behind this trait; the checks only parse tokens and
/// act on the verdict.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, jws: &DecodedJws) -> bool;
}

/// Verifies `EdDSA` signatures against one Ed25519 public key.
#[derive(Debug, Clone)]
pub struct Ed25519Verifier {
    key: VerifyingKey,
}

impl Ed25519Verifier {
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, jws: &DecodedJws) -> bool {
        if jws.algorithm() != Some("EdDSA") {
            return false;
        }
        let Ok(signature) = Signature::from_slice(&jws.signature) else {
            return false;
        };
        self.key
            .verify_strict(jws.signing_input.as_bytes(), &signature)
            .is_ok()
    }
}

impl JsonRule {
    /// The string at `pointer` is a compact JWS signed by the expected key
    /// whose JSON payload satisfies every `payload_rules` entry.
    ///
    /// Parse and signature failures are reported as messages; they never
    /// abort evaluation of the surrounding tree.
    pub fn signed_payload(
        pointer: &str,
        verifier: Arc<dyn SignatureVerifier>,
        payload_rules: Vec<JsonRule>,
    ) -> Self {
        let pointer = pointer.to_string();
        let path = render_pointer(&pointer);
        JsonRule::custom(
            &format!("The attribute '{path}' is a correctly signed payload"),
            move |doc| {
                let Some(token) = doc.pointer(&pointer).and_then(Value::as_str) else {
                    return Ok(CheckResult::error(format!(
                        "The attribute '{path}' should have been a signed payload, but was not"
                    )));
                };
                let jws = match decode_compact_jws(token) {
                    Ok(jws) => jws,
                    Err(e) => {
                        return Ok(CheckResult::error(format!(
                            "The attribute '{path}' could not be parsed as a JWS: {e}"
                        )))
                    }
                };
                let payload: Value = match serde_json::from_slice(&jws.payload) {
                    Ok(payload) => payload,
                    Err(e) => {
                        return Ok(CheckResult::error(format!(
                            "The signed payload of '{path}' containing JSON could not be parsed: {e}"
                        )))
                    }
                };
                let mut result = if jws.is_unsigned() {
                    CheckResult::error(format!(
                        "The JWS in '{path}' uses the 'none' algorithm and is therefore unsigned"
                    ))
                } else if !verifier.verify(&jws) {
                    CheckResult::error(format!(
                        "The attribute '{path}' was a valid JWS, but it was not signed by the expected key"
                    ))
                } else {
                    CheckResult::ok()
                };
                for rule in &payload_rules {
                    for error in rule.apply(&payload)?.errors {
                        result.push_error(format!("Signed payload of '{path}': {error}"));
                    }
                }
                Ok(result)
            },
        )
    }
}
