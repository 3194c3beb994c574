//! `brief sources`: what the local corpus holds and how the guardrails see it.

use anyhow::Result;
use research_brief_core::guardrails::{screen, Screened};
use research_brief_core::DocumentKind;

use crate::config::Config;
use crate::ingest::LocalCorpus;

/// One row of the listing.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub doc_id: String,
    pub kind: DocumentKind,
    pub chars: usize,
    /// `accepted`, `rejected (<pattern>)`, or `unreadable (<error>)`.
    pub status: String,
}

/// Scan the corpus and screen every document.
pub fn source_rows(corpus: &LocalCorpus) -> Vec<SourceRow> {
    let scan = corpus.scan();
    let mut rows: Vec<SourceRow> = scan
        .documents
        .iter()
        .map(|doc| {
            let status = match screen(doc) {
                Screened::Accepted(_) => "accepted".to_string(),
                Screened::Rejected { pattern, .. } => format!("rejected ({})", pattern),
            };
            SourceRow {
                doc_id: doc.doc_id.clone(),
                kind: doc.kind,
                chars: doc.text.chars().count(),
                status,
            }
        })
        .collect();

    for skipped in scan.skipped {
        let name = skipped
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        rows.push(SourceRow {
            doc_id: name,
            kind: skipped.kind,
            chars: 0,
            status: format!("unreadable ({})", skipped.error),
        });
    }

    rows
}

pub fn list_sources(config: &Config) -> Result<()> {
    let corpus = LocalCorpus::new(&config.corpus);

    for (label, dir) in [("pdfs", corpus.pdfs_dir()), ("pages", corpus.pages_dir())] {
        let status = if dir.is_dir() { "OK" } else { "MISSING" };
        println!("{:<6} {:<8} {}", label, status, dir.display());
    }
    println!();

    let rows = source_rows(&corpus);
    if rows.is_empty() {
        println!("No documents found.");
        return Ok(());
    }

    println!("{:<40} {:<6} {:>8}  STATUS", "DOC_ID", "KIND", "CHARS");
    for row in &rows {
        println!(
            "{:<40} {:<6} {:>8}  {}",
            row.doc_id,
            row.kind.as_str(),
            row.chars,
            row.status
        );
    }

    let accepted = rows.iter().filter(|r| r.status == "accepted").count();
    println!();
    println!("{} documents, {} accepted", rows.len(), accepted);

    Ok(())
}
