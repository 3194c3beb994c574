//! Numbered citations and the evidence block handed to the generator.

use std::collections::BTreeSet;
use std::collections::HashSet;

use crate::models::{Chunk, Citation};

/// Maximum excerpt length in characters, before the ellipsis.
pub const EXCERPT_CHARS: usize = 260;
pub const ELLIPSIS: &str = "…";

/// Trim `text` and cut it to [`EXCERPT_CHARS`], marking truncation.
pub fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}{}", trimmed[..cut].trim_end(), ELLIPSIS),
        None => trimmed.to_string(),
    }
}

/// One citation per distinct source, in ranked order, at most `max_citations`.
pub fn build_citations(ranked: &[Chunk], max_citations: usize) -> Vec<Citation> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();

    for chunk in ranked {
        if out.len() >= max_citations {
            break;
        }
        if !seen.insert(chunk.source.as_str()) {
            continue;
        }
        out.push(Citation {
            idx: out.len() + 1,
            title: chunk.title.clone(),
            source: chunk.source.clone(),
            excerpt: excerpt(&chunk.text),
        });
    }

    out
}

/// Distinct `source` values among `chunks`.
pub fn distinct_sources(chunks: &[Chunk]) -> BTreeSet<String> {
    chunks.iter().map(|c| c.source.clone()).collect()
}

/// Render citations as the evidence block of the user prompt.
///
/// ```text
/// [1] Title - path/or/url
/// Excerpt: first 260 characters…
/// ```
pub fn render_evidence(citations: &[Citation]) -> String {
    citations
        .iter()
        .map(|c| {
            format!(
                "[{}] {} - {}\nExcerpt: {}\n",
                c.idx, c.title, c.source, c.excerpt
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
