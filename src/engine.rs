//! Assembles a [`Pipeline`] from configuration.

use anyhow::{Context, Result};
use research_brief_core::Pipeline;
use tracing::info;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generator::create_generator;
use crate::ingest::LocalCorpus;
use crate::rerank::create_reranker;
use crate::store::JsonRunStore;

/// Build the briefing pipeline described by `config`.
///
/// The reranker is only constructed when `[retrieval] rerank = true`, so a
/// local cross-encoder is never downloaded for runs that skip it.
pub fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let source = LocalCorpus::new(&config.corpus);
    let embedder =
        create_embedder(&config.embedding).context("Failed to create embedding backend")?;
    let generator = create_generator(&config.generator).context("Failed to create generator")?;
    let sink = JsonRunStore::new(config.runs.dir.clone());

    info!(
        embedder = embedder.name(),
        dims = embedder.dims(),
        generator = generator.name(),
        runs_dir = %config.runs.dir.display(),
        "pipeline assembled"
    );

    let mut pipeline = Pipeline::new(
        Box::new(source),
        embedder,
        generator,
        Box::new(sink),
        config.pipeline_settings(),
    );

    if config.retrieval.rerank {
        let reranker = create_reranker(&config.rerank).context("Failed to create reranker")?;
        info!(reranker = reranker.name(), "rerank enabled");
        pipeline = pipeline.with_reranker(reranker);
    }

    Ok(pipeline)
}
