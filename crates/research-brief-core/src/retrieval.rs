//! Hybrid retrieval: BM25 + dense candidates, fused with RRF, optionally
//! reranked.
//!
//! A [`HybridRetriever`] is built once per run from the full chunk set and
//! queried any number of times. Searching never mutates the index, so the
//! same query always returns the same chunks.
//!
//! ```text
//! query ─┬─ LexicalIndex::top_k(lexical_k) ─┐
//!        │                                  ├─ rrf_fuse ─ keep max(2·top_k, 20)
//!        └─ DenseIndex::search(dense_k) ────┘        │
//!                                     rerank(top_k) or truncate(top_k)
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dense::{DenseIndex, Embedder};
use crate::fusion::{candidate_pool_size, rrf_fuse, DEFAULT_RRF_K};
use crate::lexical::LexicalIndex;
use crate::models::Chunk;
use crate::rerank::{rerank, RerankScorer};

/// Per-query retrieval knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub lexical_k: usize,
    pub dense_k: usize,
    pub top_k: usize,
    pub rrf_k: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            lexical_k: 30,
            dense_k: 30,
            top_k: 12,
            rrf_k: DEFAULT_RRF_K,
        }
    }
}

/// A retrieved chunk with the signals that placed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// 1-based rank in the lexical list, if it made the cut.
    pub lexical_rank: Option<usize>,
    /// 1-based rank in the dense list, if it made the cut.
    pub dense_rank: Option<usize>,
    pub fused_score: f64,
    pub rerank_score: Option<f32>,
}

/// Lexical + dense index over one run's chunks.
pub struct HybridRetriever<'e> {
    chunks: Vec<Chunk>,
    lexical: LexicalIndex,
    dense: DenseIndex,
    embedder: &'e dyn Embedder,
}

impl<'e> HybridRetriever<'e> {
    /// Build both indexes. Embeds every chunk once.
    pub fn index(chunks: Vec<Chunk>, embedder: &'e dyn Embedder) -> Result<Self> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let lexical = LexicalIndex::build(&texts);
        let dense = DenseIndex::build(embedder, &texts)
            .with_context(|| format!("Failed to embed chunks with '{}'", embedder.name()))?;

        tracing::debug!(
            chunks = chunks.len(),
            embedder = embedder.name(),
            dims = dense.dims(),
            "built hybrid index"
        );

        Ok(Self {
            chunks,
            lexical,
            dense,
            embedder,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Ranked chunks for `query`, at most `params.top_k` of them.
    pub fn search(
        &self,
        query: &str,
        params: &SearchParams,
        reranker: Option<&dyn RerankScorer>,
    ) -> Result<Vec<Chunk>> {
        Ok(self
            .search_explained(query, params, reranker)?
            .into_iter()
            .map(|s| s.chunk)
            .collect())
    }

    /// Like [`search`](Self::search), keeping each chunk's score breakdown.
    pub fn search_explained(
        &self,
        query: &str,
        params: &SearchParams,
        reranker: Option<&dyn RerankScorer>,
    ) -> Result<Vec<ScoredChunk>> {
        if self.is_empty() || params.top_k == 0 {
            return Ok(Vec::new());
        }

        let lexical: Vec<usize> = self
            .lexical
            .top_k(query, params.lexical_k)
            .into_iter()
            .map(|(i, _)| i)
            .collect();

        let query_vec = self
            .embedder
            .embed(query)
            .with_context(|| format!("Failed to embed query with '{}'", self.embedder.name()))?;
        let dense: Vec<usize> = self
            .dense
            .search(&query_vec, params.dense_k)?
            .into_iter()
            .map(|(i, _)| i)
            .collect();

        let mut fused = rrf_fuse(&[&lexical[..], &dense[..]], params.rrf_k);
        fused.truncate(candidate_pool_size(params.top_k));

        let rank_in =
            |list: &[usize], pos: usize| list.iter().position(|&p| p == pos).map(|r| r + 1);
        let explain = |pos: usize, fused_score: f64, rerank_score: Option<f32>| ScoredChunk {
            chunk: self.chunks[pos].clone(),
            lexical_rank: rank_in(&lexical[..], pos),
            dense_rank: rank_in(&dense[..], pos),
            fused_score,
            rerank_score,
        };

        let results = match reranker {
            Some(scorer) => rerank(scorer, query, fused, params.top_k, |(pos, _)| {
                self.chunks[*pos].text.as_str()
            })?
            .into_iter()
            .map(|((pos, fused_score), s)| explain(pos, fused_score, Some(s)))
            .collect(),
            None => fused
                .into_iter()
                .take(params.top_k)
                .map(|(pos, fused_score)| explain(pos, fused_score, None))
                .collect(),
        };

        Ok(results)
    }
}
