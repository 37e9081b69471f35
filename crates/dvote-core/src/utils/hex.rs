//! Hex helpers for JSON-RPC quantities, addresses and signatures.
//!
//! Every parser accepts input with or without the `0x` prefix.

use std::fmt::Write;

/// Formats bytes as a lowercase `0x`-prefixed hex string.
#[must_use]
pub fn format_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Parses a hex quantity to `u64`. Returns `None` on invalid hex or overflow.
#[must_use]
pub fn parse_hex_u64(hex: &str) -> Option<u64> {
    let hex_str = hex.strip_prefix("0x").unwrap_or(hex);
    if hex_str.is_empty() {
        return None;
    }
    u64::from_str_radix(hex_str, 16).ok()
}

/// Parses a hex string to bytes. Returns `None` on invalid hex or odd length.
#[must_use]
pub fn parse_hex_bytes(hex: &str) -> Option<Vec<u8>> {
    let hex_str = hex.strip_prefix("0x").unwrap_or(hex);
    ::hex::decode(hex_str).ok()
}

/// Parses a hex string to a fixed-size byte array.
///
/// Returns `None` if the decoded length is not exactly `N`.
#[must_use]
pub fn parse_hex_array<const N: usize>(hex: &str) -> Option<[u8; N]> {
    let bytes = parse_hex_bytes(hex)?;
    bytes.try_into().ok()
}
