//! Document acquisition: local PDFs and pages, plus web pages in online mode.
//!
//! [`LocalCorpus`] is the [`DocumentSource`] the engine uses. It reads two
//! flat directories (no recursion) in sorted order:
//!
//! | Directory | Files | `doc_id` | Kind |
//! |-----------|-------|----------|------|
//! | `pdfs_dir` | `*.pdf` | `pdf::<file name>` | `pdf` |
//! | `pages_dir` | `*.txt`, `*.md`, `*.html` | `file::<file name>` | `page` |
//!
//! In online mode each requested URL is fetched and becomes a `web`
//! document with `doc_id = url::<url>`.
//!
//! A missing directory contributes nothing. A local file that cannot be
//! read or extracted is skipped with a warning. A URL that cannot be
//! fetched fails the whole ingest, since the caller asked for it by name.

use anyhow::{bail, Context, Result};
use research_brief_core::{Document, DocumentKind, DocumentSource, RunMode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::extract::{content_type_for_path, content_type_from_header, extract_text, MIME_PDF};

/// Filesystem (and optionally web) document source.
#[derive(Debug, Clone)]
pub struct LocalCorpus {
    pdfs_dir: PathBuf,
    pages_dir: PathBuf,
    fetch_timeout: Duration,
    user_agent: String,
}

/// Result of scanning the local directories.
#[derive(Debug, Default)]
pub struct Scan {
    pub documents: Vec<Document>,
    /// Files that matched but could not be read or extracted.
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub kind: DocumentKind,
    pub error: String,
}

impl LocalCorpus {
    pub fn new(config: &CorpusConfig) -> Self {
        Self {
            pdfs_dir: config.pdfs_dir.clone(),
            pages_dir: config.pages_dir.clone(),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            user_agent: config.user_agent.clone(),
        }
    }

    pub fn pdfs_dir(&self) -> &Path {
        &self.pdfs_dir
    }

    pub fn pages_dir(&self) -> &Path {
        &self.pages_dir
    }

    /// Read every local PDF, then every local page.
    pub fn scan(&self) -> Scan {
        let mut scan = Scan::default();
        for path in list_files(&self.pdfs_dir, |ct| ct == MIME_PDF) {
            self.load_into(&path, DocumentKind::Pdf, &mut scan);
        }
        for path in list_files(&self.pages_dir, |ct| ct != MIME_PDF) {
            self.load_into(&path, DocumentKind::Page, &mut scan);
        }
        scan
    }

    fn load_into(&self, path: &Path, kind: DocumentKind, scan: &mut Scan) {
        match load_file(path, kind) {
            Ok(doc) => {
                debug!(doc_id = %doc.doc_id, chars = doc.text.len(), "loaded document");
                scan.documents.push(doc);
            }
            Err(e) => {
                let error = format!("{:#}", e);
                warn!(path = %path.display(), error = %error, "skipping unreadable file");
                scan.skipped.push(SkippedFile {
                    path: path.to_path_buf(),
                    kind,
                    error,
                });
            }
        }
    }

    /// Fetch one URL and extract its text.
    pub fn fetch_url(&self, url: &str) -> Result<Document> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("Unsupported URL '{}': only http and https are fetched", url);
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(self.fetch_timeout)
            .user_agent(self.user_agent.clone())
            .build()?;

        let response = client
            .get(url)
            .send()
            .with_context(|| format!("Failed to fetch {}", url))?;
        let status = response.status();
        if !status.is_success() {
            bail!("Failed to fetch {}: HTTP {}", url, status);
        }

        let content_type = content_type_from_header(
            response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        let bytes = response
            .bytes()
            .with_context(|| format!("Failed to read body of {}", url))?;
        let text = extract_text(&bytes, content_type)
            .with_context(|| format!("Failed to extract text from {}", url))?;

        Ok(Document::new(
            format!("url::{}", url),
            url,
            url,
            text.trim(),
            DocumentKind::Web,
        ))
    }
}

impl DocumentSource for LocalCorpus {
    fn ingest(&self, mode: RunMode, urls: &[String]) -> Result<Vec<Document>> {
        let mut documents = self.scan().documents;

        if mode == RunMode::Online {
            for url in urls {
                documents.push(self.fetch_url(url)?);
            }
        } else if !urls.is_empty() {
            debug!(count = urls.len(), "offline mode, ignoring urls");
        }

        Ok(documents)
    }
}

/// Files directly inside `dir` whose content type passes `accept`, sorted by name.
fn list_files(dir: &Path, accept: impl Fn(&str) -> bool) -> Vec<PathBuf> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "source directory missing, skipping");
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| content_type_for_path(path).is_some_and(&accept))
        .collect();

    files.sort();
    files
}

fn load_file(path: &Path, kind: DocumentKind) -> Result<Document> {
    let content_type = content_type_for_path(path)
        .ok_or_else(|| anyhow::anyhow!("unsupported file type: {}", path.display()))?;
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let text = extract_text(&bytes, content_type)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| name.clone());
    let prefix = match kind {
        DocumentKind::Pdf => "pdf",
        DocumentKind::Page | DocumentKind::Web => "file",
    };

    Ok(Document::new(
        format!("{}::{}", prefix, name),
        path.display().to_string(),
        stem,
        text.trim(),
        kind,
    ))
}
