//! # Research Brief
//!
//! Evidence-grounded research briefings from local PDFs, text pages, and
//! (in online mode) web pages.
//!
//! The retrieval and answer-gating logic lives in `research-brief-core`;
//! this crate supplies everything that touches the outside world and wires
//! it into a [`research_brief_core::Pipeline`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────────────┐   ┌────────────┐
//! │ LocalCorpus  │──▶│ Pipeline (core)               │──▶│ JsonRunStore│
//! │ PDF/page/web │   │ guard → chunk → BM25+dense    │   │ runs/*.json │
//! └──────────────┘   │ → RRF → rerank → generate     │   └────────────┘
//!                    │ → quality gate                │
//!                    └───────────────┬──────────────┘
//!                        ┌───────────┼───────────┐
//!                        ▼           ▼           ▼
//!                   ┌────────┐  ┌────────┐  ┌────────┐
//!                   │  CLI   │  │  HTTP  │  │  eval  │
//!                   │(brief) │  │ (axum) │  │ (JSONL)│
//!                   └────────┘  └────────┘  └────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`extract`] | PDF / HTML / text extraction |
//! | [`ingest`] | Local corpus and web fetch (`DocumentSource`) |
//! | [`embedding`] | Hash, OpenAI, Ollama, and local embedders |
//! | [`rerank`] | Term-overlap and cross-encoder rerank scorers |
//! | [`generator`] | Evidence-only, OpenAI, and Ollama generators |
//! | [`http`] | Blocking JSON POST with retry |
//! | [`store`] | JSON trace persistence (`TraceSink`) |
//! | [`engine`] | Pipeline assembly from config |
//! | [`server`] | HTTP API |
//! | [`eval`] | Batch evaluation |
//! | [`sources`] | Corpus listing |

pub mod config;
pub mod embedding;
pub mod engine;
pub mod eval;
pub mod extract;
pub mod generator;
pub mod http;
pub mod ingest;
pub mod logging;
pub mod rerank;
pub mod server;
pub mod sources;
pub mod store;
