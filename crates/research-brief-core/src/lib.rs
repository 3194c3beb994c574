//! # Research Brief Core
//!
//! Backend-agnostic logic for Research Brief: data models, ingestion
//! guardrails, sliding-window chunking, hybrid retrieval (BM25 + dense +
//! Reciprocal Rank Fusion + optional rerank), citation building, the answer
//! quality gate, and the traced briefing pipeline.
//!
//! This crate performs no network or filesystem I/O of its own. Everything
//! that talks to the outside world (document acquisition, embedding models,
//! rerank models, text generators, trace storage) is reached through the
//! narrow traits in [`pipeline`] and [`dense`], implemented by the
//! `research-brief` application crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | `Document`, `Chunk`, `Citation`, run mode |
//! | [`guardrails`] | Prompt-injection detection and PII redaction |
//! | [`chunk`] | Overlapping fixed-size window chunker |
//! | [`lexical`] | BM25 Okapi index over chunk tokens |
//! | [`dense`] | `Embedder` trait and inner-product index |
//! | [`fusion`] | Reciprocal Rank Fusion |
//! | [`rerank`] | `RerankScorer` trait and rerank pass |
//! | [`retrieval`] | Hybrid retriever tying the above together |
//! | [`citations`] | Source-deduplicated citations and evidence rendering |
//! | [`quality`] | Accept/abstain decision for generated answers |
//! | [`prompt`] | Briefing system prompt and user prompt template |
//! | [`trace`] | Per-run tracer with explicitly scoped spans |
//! | [`pipeline`] | Staged orchestrator and collaborator traits |

pub mod chunk;
pub mod citations;
pub mod dense;
pub mod fusion;
pub mod guardrails;
pub mod lexical;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod quality;
pub mod rerank;
pub mod retrieval;
pub mod trace;

pub use dense::Embedder;
pub use models::{Chunk, Citation, Document, DocumentKind, RunMode};
pub use pipeline::{
    DocumentSource, Generator, Pipeline, PipelineError, PipelineSettings, RunResult, Stage,
    TraceSink,
};
pub use quality::{Decision, Verdict};
pub use rerank::RerankScorer;
pub use retrieval::{HybridRetriever, ScoredChunk, SearchParams};
pub use trace::{RunTrace, Span, Tracer};
