//! Ranking and pairing of confirmed endpoints.
//!
//! All functions are stateless; discovery feeds them the confirmed clients once the
//! health-check rounds are over.
//!
//! # Key Functions
//!
//! - [`sort_by_weight`]: descending weight, stable
//! - [`plurality_block`]: most frequently reported block number
//! - [`rank_chain_nodes`]: plurality agreement first, weight second
//! - [`pair_up`]: index pairing with random fill of the shorter side

use std::{cmp::Ordering, collections::HashMap};

use crate::utils::random_index;

/// Sorts by descending weight. Equal weights keep their relative order.
pub fn sort_by_weight<T, W>(items: &mut [T], weight: W)
where
    W: Fn(&T) -> f64,
{
    items.sort_by(|a, b| weight(b).total_cmp(&weight(a)));
}

/// Returns the block number reported by the most nodes.
///
/// Returns `None` when no number is reported more than once, which makes the vote
/// meaningless. Ties between equally frequent numbers go to the higher block.
#[must_use]
pub fn plurality_block<I>(blocks: I) -> Option<u64>
where
    I: IntoIterator<Item = Option<u64>>,
{
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for block in blocks.into_iter().flatten() {
        *counts.entry(block).or_insert(0) += 1;
    }

    let (block, count) = counts
        .into_iter()
        .max_by(|(block_a, count_a), (block_b, count_b)| {
            count_a.cmp(count_b).then_with(|| block_a.cmp(block_b))
        })?;

    (count > 1).then_some(block)
}

/// Orders chain nodes agreeing with the plurality block first, then by descending weight.
///
/// Falls back to weight alone when [`plurality_block`] finds no agreement.
pub fn rank_chain_nodes<T, B, W>(items: &mut [T], block: B, weight: W)
where
    B: Fn(&T) -> Option<u64>,
    W: Fn(&T) -> f64,
{
    let Some(winner) = plurality_block(items.iter().map(&block)) else {
        sort_by_weight(items, weight);
        return;
    };

    items.sort_by(|a, b| {
        let a_agrees = block(a) == Some(winner);
        let b_agrees = block(b) == Some(winner);
        match (a_agrees, b_agrees) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => weight(b).total_cmp(&weight(a)),
        }
    });
}

/// Builds `max(len_a, len_b)` pairs.
///
/// Index `i` pairs `a[i]` with `b[i]` while both exist; past the end of the shorter list its
/// side is a uniformly random element of it. Returns nothing if either list is empty.
#[must_use]
pub fn pair_up<A: Clone, B: Clone>(a: &[A], b: &[B]) -> Vec<(A, B)> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }

    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let left = a.get(i).unwrap_or_else(|| pick(a));
            let right = b.get(i).unwrap_or_else(|| pick(b));
            (left.clone(), right.clone())
        })
        .collect()
}

fn pick<T>(items: &[T]) -> &T {
    // Callers guarantee a non-empty slice.
    let idx = random_index(items.len()).unwrap_or(0);
    &items[idx]
}
