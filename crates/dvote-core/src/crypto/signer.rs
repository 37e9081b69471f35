//! The signing capability and its secp256k1 implementation.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};
use thiserror::Error;

use crate::utils::{format_hex, parse_hex_bytes};

const MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Errors produced while signing or recovering signatures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SignerError {
    #[error("no signer configured")]
    Unavailable,

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

/// A capability that produces personal-message signatures.
///
/// Implementations must be deterministic for a given key and message so that envelope
/// signatures are reproducible in tests.
pub trait Signer: Send + Sync {
    /// Signs `message` and returns the `0x`-prefixed 65-byte signature.
    fn sign_message(&self, message: &[u8]) -> Result<String, SignerError>;

    /// The `0x`-prefixed Ethereum address of the signing key.
    fn address(&self) -> String;
}

/// keccak256 of the personal-message prefixed payload.
#[must_use]
pub fn hash_message(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(MESSAGE_PREFIX.as_bytes());
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Recovers the public key that produced `signature` over `message`.
pub fn recover_public_key(signature: &str, message: &[u8]) -> Result<VerifyingKey, SignerError> {
    let bytes = parse_hex_bytes(signature)
        .ok_or_else(|| SignerError::InvalidSignature("not hex".to_string()))?;
    if bytes.len() != 65 {
        return Err(SignerError::InvalidSignature(format!("expected 65 bytes, got {}", bytes.len())));
    }

    let sig = Signature::from_slice(&bytes[..64])
        .map_err(|e| SignerError::InvalidSignature(e.to_string()))?;
    let v = bytes[64];
    let recid = RecoveryId::from_byte(if v >= 27 { v - 27 } else { v })
        .ok_or_else(|| SignerError::InvalidSignature(format!("bad recovery byte {v}")))?;

    VerifyingKey::recover_from_prehash(&hash_message(message), &sig, recid)
        .map_err(|e| SignerError::InvalidSignature(e.to_string()))
}

/// Derives the Ethereum address of a public key.
#[must_use]
pub fn address_of(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    format_hex(&digest[12..])
}

/// A secp256k1 key pair held in memory.
#[derive(Clone)]
pub struct Wallet {
    key: SigningKey,
}

impl Wallet {
    /// Generates a fresh random key.
    #[must_use]
    pub fn random() -> Self {
        Self { key: SigningKey::random(&mut rand::thread_rng()) }
    }

    /// Loads a key from a 32-byte hex private key, with or without `0x`.
    pub fn from_private_key_hex(hex: &str) -> Result<Self, SignerError> {
        let bytes = parse_hex_bytes(hex)
            .ok_or_else(|| SignerError::InvalidKey("not hex".to_string()))?;
        let key = SigningKey::from_slice(&bytes).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self { key })
    }

    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        *self.key.verifying_key()
    }

    /// Compressed SEC1 public key as `0x`-prefixed hex, the format gateways advertise.
    #[must_use]
    pub fn public_key_hex(&self) -> String {
        format_hex(self.verifying_key().to_encoded_point(true).as_bytes())
    }
}

impl Signer for Wallet {
    fn sign_message(&self, message: &[u8]) -> Result<String, SignerError> {
        let digest = hash_message(message);
        let (sig, recid) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| SignerError::Signing(e.to_string()))?;

        let mut out = Vec::with_capacity(65);
        out.extend_from_slice(&sig.to_bytes());
        out.push(27 + recid.to_byte());
        Ok(format_hex(&out))
    }

    fn address(&self) -> String {
        address_of(&self.verifying_key())
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet").field("address", &self.address()).finish_non_exhaustive()
    }
}
