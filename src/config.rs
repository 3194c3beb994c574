//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, via [`Config::minimal`]) yields a working offline setup: hashing
//! embeddings, term-overlap rerank, and the evidence-only generator.
//!
//! ```toml
//! [corpus]
//! pdfs_dir = "data/raw/pdfs"
//! pages_dir = "data/raw/pages"
//!
//! [retrieval]
//! top_k = 12
//! rerank = true
//!
//! [generator]
//! provider = "ollama"
//! model = "llama3.1"
//! ```

use anyhow::{bail, Context, Result};
use research_brief_core::{PipelineSettings, SearchParams};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub rerank: RerankConfig,
    pub generator: GeneratorConfig,
    pub quality: QualityConfig,
    pub runs: RunsConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CorpusConfig {
    pub pdfs_dir: PathBuf,
    pub pages_dir: PathBuf,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            pdfs_dir: PathBuf::from("data/raw/pdfs"),
            pages_dir: PathBuf::from("data/raw/pages"),
            fetch_timeout_secs: 20,
            user_agent: format!("research-brief/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub window_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_chars: 900,
            overlap_chars: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub lexical_k: usize,
    pub dense_k: usize,
    pub rrf_k: u32,
    pub rerank: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 12,
            lexical_k: 30,
            dense_k: 30,
            rrf_k: 60,
            rerank: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `hash`, `openai`, `ollama`, or `local`.
    pub provider: String,
    pub model: Option<String>,
    pub dims: Option<usize>,
    /// Base URL for Ollama.
    pub url: Option<String>,
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hash".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RerankConfig {
    /// `overlap` or `local`.
    pub provider: String,
    pub model: Option<String>,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            provider: "overlap".to_string(),
            model: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeneratorConfig {
    /// `none`, `openai`, or `ollama`.
    pub provider: String,
    pub model: Option<String>,
    /// Base URL override (Ollama host, or an OpenAI-compatible endpoint).
    pub url: Option<String>,
    /// Defaults to 90s for OpenAI and 120s for Ollama.
    pub timeout_secs: Option<u64>,
    pub max_retries: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: "none".to_string(),
            model: None,
            url: None,
            timeout_secs: None,
            max_retries: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QualityConfig {
    pub min_distinct_sources: usize,
    pub max_citations: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_distinct_sources: 2,
            max_citations: 8,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RunsConfig {
    pub dir: PathBuf,
}

impl Default for RunsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/runs"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

impl Config {
    /// All defaults; used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Core pipeline settings derived from this config.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            window_chars: self.chunking.window_chars,
            overlap_chars: self.chunking.overlap_chars,
            search: SearchParams {
                lexical_k: self.retrieval.lexical_k,
                dense_k: self.retrieval.dense_k,
                top_k: self.retrieval.top_k,
                rrf_k: self.retrieval.rrf_k,
            },
            rerank: self.retrieval.rerank,
            min_distinct_sources: self.quality.min_distinct_sources,
            max_citations: self.quality.max_citations,
        }
    }

    /// Check value ranges and provider names.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.window_chars == 0 {
            bail!("chunking.window_chars must be > 0");
        }
        if self.chunking.overlap_chars >= self.chunking.window_chars {
            bail!(
                "chunking.overlap_chars ({}) must be less than chunking.window_chars ({})",
                self.chunking.overlap_chars,
                self.chunking.window_chars
            );
        }

        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.retrieval.lexical_k < 1 || self.retrieval.dense_k < 1 {
            bail!("retrieval.lexical_k and retrieval.dense_k must be >= 1");
        }

        if self.quality.max_citations < 1 {
            bail!("quality.max_citations must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "hash" | "openai" | "ollama" | "local" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be hash, openai, ollama, or local.",
                other
            ),
        }
        if matches!(self.embedding.provider.as_str(), "openai" | "ollama") {
            if self.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    self.embedding.provider
                );
            }
        }
        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }

        match self.rerank.provider.as_str() {
            "overlap" | "local" => {}
            other => bail!(
                "Unknown rerank provider: '{}'. Must be overlap or local.",
                other
            ),
        }

        match self.generator.provider.as_str() {
            "none" | "openai" | "ollama" => {}
            other => bail!(
                "Unknown generator provider: '{}'. Must be none, openai, or ollama.",
                other
            ),
        }

        Ok(())
    }
}

/// Read, parse, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("brief.toml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_config(&write(&tmp, "")).unwrap();
        assert_eq!(cfg.chunking.window_chars, 900);
        assert_eq!(cfg.chunking.overlap_chars, 120);
        assert_eq!(cfg.retrieval.top_k, 12);
        assert_eq!(cfg.retrieval.lexical_k, 30);
        assert!(cfg.retrieval.rerank);
        assert_eq!(cfg.embedding.provider, "hash");
        assert_eq!(cfg.generator.provider, "none");
        assert_eq!(cfg.quality.min_distinct_sources, 2);
        assert_eq!(cfg.quality.max_citations, 8);
        assert_eq!(cfg.runs.dir, PathBuf::from("data/runs"));
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn test_partial_sections() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_config(&write(
            &tmp,
            "[retrieval]\ntop_k = 4\nrerank = false\n\n[corpus]\npages_dir = \"notes\"\n",
        ))
        .unwrap();
        assert_eq!(cfg.retrieval.top_k, 4);
        assert!(!cfg.retrieval.rerank);
        assert_eq!(cfg.retrieval.dense_k, 30);
        assert_eq!(cfg.corpus.pages_dir, PathBuf::from("notes"));
        assert_eq!(cfg.corpus.pdfs_dir, PathBuf::from("data/raw/pdfs"));

        let settings = cfg.pipeline_settings();
        assert_eq!(settings.search.top_k, 4);
        assert!(!settings.rerank);
    }

    #[test]
    fn test_overlap_must_be_below_window() {
        let tmp = TempDir::new().unwrap();
        let err = load_config(&write(
            &tmp,
            "[chunking]\nwindow_chars = 100\noverlap_chars = 100\n",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("overlap_chars"));
    }

    #[test]
    fn test_unknown_providers_rejected() {
        let tmp = TempDir::new().unwrap();
        assert!(load_config(&write(&tmp, "[generator]\nprovider = \"gpt\"\n")).is_err());
        assert!(load_config(&write(&tmp, "[embedding]\nprovider = \"disabled\"\n")).is_err());
        assert!(load_config(&write(&tmp, "[rerank]\nprovider = \"cohere\"\n")).is_err());
    }

    #[test]
    fn test_remote_embedding_needs_model_and_dims() {
        let tmp = TempDir::new().unwrap();
        let err = load_config(&write(&tmp, "[embedding]\nprovider = \"openai\"\n")).unwrap_err();
        assert!(err.to_string().contains("embedding.model"));

        let ok = load_config(&write(
            &tmp,
            "[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n",
        ));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.retrieval.top_k, 12);
        assert!(load_config(&tmp.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(load_config(&write(&tmp, "[retrieval\ntop_k = ")).is_err());
    }
}
