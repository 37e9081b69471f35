//! ENS name resolution primitives.
//!
//! Resolution is two `eth_call`s: `resolver(namehash)` on the registry, then
//! `addr(namehash)` on the returned resolver. This module only builds the call data and
//! decodes the results; the calls themselves go through [`super::web3::JsonRpcChain`].

use sha3::{Digest, Keccak256};

use crate::utils::{format_hex, parse_hex_bytes};

/// ENS registry address, identical on mainnet and the public testnets.
pub const ENS_REGISTRY: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e";

/// `resolver(bytes32)`
const RESOLVER_SELECTOR: [u8; 4] = [0x01, 0x78, 0xb8, 0xbf];

/// `addr(bytes32)`
const ADDR_SELECTOR: [u8; 4] = [0x3b, 0x3b, 0x57, 0xde];

/// EIP-137 namehash. Labels are hashed as given; callers pass normalized lowercase names.
#[must_use]
pub fn namehash(name: &str) -> [u8; 32] {
    let mut node = [0u8; 32];
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let label_hash = Keccak256::digest(label.as_bytes());
        let mut hasher = Keccak256::new();
        hasher.update(node);
        hasher.update(label_hash);
        node = hasher.finalize().into();
    }
    node
}

fn call_data(selector: [u8; 4], node: &[u8; 32]) -> String {
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&selector);
    data.extend_from_slice(node);
    format_hex(&data)
}

/// Call data for `resolver(node)` on the registry.
#[must_use]
pub fn resolver_call_data(node: &[u8; 32]) -> String {
    call_data(RESOLVER_SELECTOR, node)
}

/// Call data for `addr(node)` on a resolver.
#[must_use]
pub fn addr_call_data(node: &[u8; 32]) -> String {
    call_data(ADDR_SELECTOR, node)
}

/// Decodes an ABI-encoded `address` return value.
///
/// Returns `None` for malformed output and for the zero address, which ENS uses for
/// "not set".
#[must_use]
pub fn decode_address(output: &str) -> Option<String> {
    let bytes = parse_hex_bytes(output)?;
    if bytes.len() < 32 {
        return None;
    }
    let word = &bytes[..32];
    if word[..12].iter().any(|b| *b != 0) {
        return None;
    }
    let address = &word[12..];
    if address.iter().all(|b| *b == 0) {
        return None;
    }
    Some(format_hex(address))
}
