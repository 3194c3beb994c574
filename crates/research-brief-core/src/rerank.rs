//! Second-pass relevance scoring of fused candidates.
//!
//! A [`RerankScorer`] rates one `(query, text)` pair at a time. [`rerank`]
//! applies it to a short candidate list, reorders by score (stable, so equal
//! scores keep their fused order), and truncates to `top_k`.

use anyhow::Result;
use std::cmp::Ordering;

/// Pairwise relevance scorer (cross-encoder style).
pub trait RerankScorer: Send + Sync {
    /// Scorer identifier recorded in traces.
    fn name(&self) -> &str;
    /// Relevance of `text` to `query`; higher is better.
    fn score(&self, query: &str, text: &str) -> Result<f32>;
}

/// Rerank `candidates` by `scorer` and keep the best `top_k`.
///
/// `text_of` maps a candidate to the text that gets scored. Returns each
/// surviving candidate paired with its rerank score.
pub fn rerank<'t, T, F>(
    scorer: &dyn RerankScorer,
    query: &str,
    candidates: Vec<T>,
    top_k: usize,
    text_of: F,
) -> Result<Vec<(T, f32)>>
where
    F: Fn(&T) -> &'t str,
{
    let mut scored = Vec::with_capacity(candidates.len());
    for cand in candidates {
        let s = scorer.score(query, text_of(&cand))?;
        scored.push((cand, s));
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    Ok(scored)
}
