//! Canonical JSON and signed envelopes.
//!
//! Request bodies are canonicalized (object keys in ascending lexical order, arrays in
//! their original order) and serialized compactly before signing, so two bodies with the
//! same content always produce the same signature regardless of field insertion order.
//!
//! Responses are verified over the literal bytes the gateway sent. Re-serializing a parsed
//! response can change number formatting or escaping, so [`verify_json`] exists only for
//! callers that no longer have the raw payload.

use serde_json::{Map, Value};

use super::signer::{recover_public_key, Signer, SignerError};
use crate::utils::parse_hex_bytes;
use k256::ecdsa::VerifyingKey;

/// Returns a copy of `value` with every object's keys in ascending order.
///
/// Idempotent; the input is left untouched.
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort_unstable();

            let mut out = Map::with_capacity(obj.len());
            for key in keys {
                if let Some(inner) = obj.get(key) {
                    out.insert(key.clone(), canonicalize(inner));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        scalar => scalar.clone(),
    }
}

/// Serializes `value` as compact JSON with object keys sorted at every level.
///
/// Does not depend on the map ordering serde_json was compiled with.
#[must_use]
pub fn to_canonical_string(value: &Value) -> String {
    let mut out = String::with_capacity(256);
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort_unstable();

            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(inner) = obj.get(key) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Signs the canonical serialization of `body`.
pub fn sign(body: &Value, signer: Option<&dyn Signer>) -> Result<String, SignerError> {
    let signer = signer.ok_or(SignerError::Unavailable)?;
    signer.sign_message(to_canonical_string(body).as_bytes())
}

/// Verifies `signature` over the literal `payload` bytes against `public_key`.
///
/// An unset or empty public key means the gateway is not pinned and everything verifies.
/// A pinned key with a missing signature never verifies.
#[must_use]
pub fn verify(signature: Option<&str>, public_key: Option<&str>, payload: &[u8]) -> bool {
    let Some(expected) = public_key.filter(|k| !k.is_empty()) else {
        return true;
    };
    let Some(signature) = signature.filter(|s| !s.is_empty()) else {
        return false;
    };
    let Some(expected) = parse_public_key(expected) else {
        tracing::debug!("pinned public key is not a valid sec1 key");
        return false;
    };

    match recover_public_key(signature, payload) {
        Ok(recovered) => recovered == expected,
        Err(e) => {
            tracing::debug!(error = %e, "signature recovery failed");
            false
        }
    }
}

/// Verifies against the canonical re-serialization of `value`.
#[must_use]
pub fn verify_json(signature: Option<&str>, public_key: Option<&str>, value: &Value) -> bool {
    verify(signature, public_key, to_canonical_string(value).as_bytes())
}

fn parse_public_key(hex: &str) -> Option<VerifyingKey> {
    let bytes = parse_hex_bytes(hex)?;
    VerifyingKey::from_sec1_bytes(&bytes).ok()
}
