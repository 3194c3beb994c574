//! Reciprocal Rank Fusion.
//!
//! Each ranked list contributes `1 / (k + rank)` to every id it contains,
//! with `rank` 1-based. Ids missing from a list get nothing from it. Fused
//! scores are sorted descending; equal scores keep first-seen order (the
//! first list's order, then ids that only appear in later lists).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

/// Default RRF smoothing constant.
pub const DEFAULT_RRF_K: u32 = 60;

/// Contribution of a single 1-based `rank` under constant `k`.
pub fn rrf_contribution(k: u32, rank: usize) -> f64 {
    1.0 / (k as f64 + rank as f64)
}

/// Fuse ranked id lists into `(id, score)` pairs, best first.
pub fn rrf_fuse<T: Clone + Eq + Hash>(lists: &[&[T]], k: u32) -> Vec<(T, f64)> {
    let mut fused: Vec<(T, f64)> = Vec::new();
    let mut position: HashMap<T, usize> = HashMap::new();

    for list in lists {
        for (i, id) in list.iter().enumerate() {
            let contribution = rrf_contribution(k, i + 1);
            match position.get(id) {
                Some(&p) => fused[p].1 += contribution,
                None => {
                    position.insert(id.clone(), fused.len());
                    fused.push((id.clone(), contribution));
                }
            }
        }
    }

    // Stable sort: equal scores keep insertion order.
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    fused
}

/// Number of fused candidates kept ahead of rerank/truncation.
pub fn candidate_pool_size(top_k: usize) -> usize {
    (top_k * 2).max(20)
}
