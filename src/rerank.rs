//! Rerank scorers.
//!
//! - **[`TermOverlapScorer`]**: query-word coverage with saturating term
//!   frequency. Offline and deterministic; the default.
//! - **`CrossEncoderScorer`**: fastembed `TextRerank` cross-encoder
//!   (`--features local-models`).

use anyhow::{bail, Result};
use research_brief_core::RerankScorer;
use std::collections::{HashMap, HashSet};

use crate::config::RerankConfig;
use crate::embedding::word_tokens;

/// Term-frequency saturation, as BM25's `k1`.
const SATURATION: f32 = 1.2;

/// Scores a candidate by query-word coverage.
///
/// ```text
/// score = Σ_{w ∈ distinct query words} tf(w)·(k + 1) / (tf(w) + k)  /  |query words|
/// ```
///
/// A text containing every query word once scores `1.0`; repeats add a
/// little, capped at `k + 1` per word.
pub struct TermOverlapScorer;

impl RerankScorer for TermOverlapScorer {
    fn name(&self) -> &str {
        "term-overlap"
    }

    fn score(&self, query: &str, text: &str) -> Result<f32> {
        let query_words: HashSet<String> = word_tokens(query).collect();
        if query_words.is_empty() {
            return Ok(0.0);
        }
        let mut tf: HashMap<String, u32> = HashMap::new();
        for word in word_tokens(text) {
            *tf.entry(word).or_insert(0) += 1;
        }

        let total: f32 = query_words
            .iter()
            .filter_map(|w| tf.get(w))
            .map(|&n| {
                let n = n as f32;
                n * (SATURATION + 1.0) / (n + SATURATION)
            })
            .sum();
        Ok(total / query_words.len() as f32)
    }
}

#[cfg(feature = "local-models")]
pub use local::CrossEncoderScorer;

#[cfg(feature = "local-models")]
mod local {
    use anyhow::{bail, Result};
    use research_brief_core::RerankScorer;
    use std::sync::Mutex;

    use crate::config::RerankConfig;

    const DEFAULT_MODEL: &str = "bge-reranker-base";

    /// Cross-encoder rerank model, downloaded on first use.
    pub struct CrossEncoderScorer {
        model_name: String,
        model: Mutex<fastembed::TextRerank>,
    }

    impl CrossEncoderScorer {
        pub fn new(config: &RerankConfig) -> Result<Self> {
            let model_name = config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string());
            let reranker_model = match model_name.as_str() {
                "bge-reranker-base" => fastembed::RerankerModel::BGERerankerBase,
                "jina-reranker-v1-turbo-en" => fastembed::RerankerModel::JINARerankerV1TurboEn,
                other => bail!(
                    "Unknown local rerank model: '{}'. Supported models: \
                     bge-reranker-base, jina-reranker-v1-turbo-en",
                    other
                ),
            };

            let model = fastembed::TextRerank::try_new(
                fastembed::RerankInitOptions::new(reranker_model).with_show_download_progress(true),
            )
            .map_err(|e| anyhow::anyhow!("Failed to initialize local rerank model: {}", e))?;

            Ok(Self {
                model_name,
                model: Mutex::new(model),
            })
        }
    }

    impl RerankScorer for CrossEncoderScorer {
        fn name(&self) -> &str {
            &self.model_name
        }

        fn score(&self, query: &str, text: &str) -> Result<f32> {
            let mut model = self
                .model
                .lock()
                .map_err(|_| anyhow::anyhow!("local rerank model lock poisoned"))?;
            let results = model
                .rerank(query, vec![text], false, None)
                .map_err(|e| anyhow::anyhow!("Local rerank failed: {}", e))?;
            results
                .first()
                .map(|r| r.score)
                .ok_or_else(|| anyhow::anyhow!("Empty rerank response"))
        }
    }
}

/// Create the configured rerank scorer.
pub fn create_reranker(config: &RerankConfig) -> Result<Box<dyn RerankScorer>> {
    match config.provider.as_str() {
        "overlap" => Ok(Box::new(TermOverlapScorer)),
        #[cfg(feature = "local-models")]
        "local" => Ok(Box::new(CrossEncoderScorer::new(config)?)),
        #[cfg(not(feature = "local-models"))]
        "local" => bail!("Local rerank provider requires --features local-models"),
        other => bail!("Unknown rerank provider: {}", other),
    }
}
