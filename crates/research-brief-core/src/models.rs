//! Core data models that flow through the briefing pipeline.
//!
//! Documents come from a [`DocumentSource`](crate::pipeline::DocumentSource),
//! are screened by the guardrails, split into [`Chunk`]s, ranked, and finally
//! condensed into numbered [`Citation`]s for the generator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Local PDF file.
    Pdf,
    /// Local text, Markdown, or HTML page.
    Page,
    /// Page fetched over HTTP in online mode.
    Web,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Page => "page",
            DocumentKind::Web => "web",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plain-text document handed to the pipeline by the ingestion layer.
///
/// `doc_id` is stable per source (`pdf::<name>`, `file::<name>`,
/// `url::<url>`). Documents are never mutated; redaction produces a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    /// Origin identifier: a filesystem path or URL.
    pub source: String,
    pub title: String,
    pub text: String,
    pub kind: DocumentKind,
}

impl Document {
    pub fn new(
        doc_id: impl Into<String>,
        source: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
        kind: DocumentKind,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            source: source.into(),
            title: title.into(),
            text: text.into(),
            kind,
        }
    }

    /// Copy of this document with its text replaced.
    pub fn with_text(&self, text: String) -> Self {
        Self {
            text,
            ..self.clone()
        }
    }
}

/// A window of a document's normalized text.
///
/// `chunk_id` has the form `<doc_id>::chunk::<sequence>` and is unique
/// within a run. `doc_id` is a back-reference only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub source: String,
    pub title: String,
    pub text: String,
}

impl Chunk {
    pub fn new(
        chunk_id: impl Into<String>,
        doc_id: impl Into<String>,
        source: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            doc_id: doc_id.into(),
            source: source.into(),
            title: title.into(),
            text: text.into(),
        }
    }
}

/// A numbered excerpt the generator may cite as `[idx]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based, contiguous within one answer.
    pub idx: usize,
    pub title: String,
    pub source: String,
    pub excerpt: String,
}

/// Ingestion mode requested for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Local PDFs and pages only.
    #[default]
    Offline,
    /// Local sources plus the caller's URLs.
    Online,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Offline => "offline",
            RunMode::Online => "online",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offline" => Ok(RunMode::Offline),
            "online" => Ok(RunMode::Online),
            other => anyhow::bail!("Unknown mode: '{}'. Use offline or online.", other),
        }
    }
}
