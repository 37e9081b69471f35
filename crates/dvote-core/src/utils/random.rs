//! Random identifiers, scores and uniform shuffling.
//!
//! Everything draws from [`rand::thread_rng`], which is seeded from the OS entropy source
//! and reseeded periodically.

use rand::{seq::SliceRandom, Rng, RngCore};

/// Returns `len` random bytes.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

/// Returns `len` random bytes as a lowercase hex string without prefix.
#[must_use]
pub fn random_hex(len: usize) -> String {
    hex::encode(random_bytes(len))
}

/// Returns a uniformly random index in `0..len`, or `None` for an empty range.
#[must_use]
pub fn random_index(len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(rand::thread_rng().gen_range(0..len))
}

/// Returns a random score in `0.0..100.0`, used as the jitter component of gateway weights.
#[must_use]
pub fn random_score() -> f64 {
    rand::thread_rng().gen_range(0.0..100.0)
}

/// Shuffles the slice in place with a uniform Fisher-Yates permutation.
pub fn shuffle<T>(items: &mut [T]) {
    items.shuffle(&mut rand::thread_rng());
}
