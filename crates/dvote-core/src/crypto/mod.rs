//! Message signing and signed-envelope handling.
//!
//! Gateways and clients authenticate payloads with Ethereum personal-message signatures:
//! the payload is prefixed with `"\x19Ethereum Signed Message:\n" + len`, hashed with
//! keccak256 and signed with a recoverable secp256k1 signature encoded as 65 bytes
//! (`r || s || v`, `v = 27 + recovery id`).
//!
//! - [`signer`]: the [`Signer`] capability and the [`Wallet`] key holder
//! - [`envelope`]: canonical JSON, signing of request bodies and verification of the
//!   literal response bytes

pub mod envelope;
pub mod signer;

pub use envelope::{canonicalize, sign, to_canonical_string, verify, verify_json};
pub use signer::{address_of, hash_message, recover_public_key, Signer, SignerError, Wallet};
