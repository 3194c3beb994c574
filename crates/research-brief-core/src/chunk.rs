//! Sliding-window text chunker.
//!
//! Splits a document's text into overlapping fixed-size windows measured in
//! characters (not bytes, so multi-byte text never splits mid-character).
//!
//! # Algorithm
//!
//! 1. Collapse every whitespace run to a single space and trim.
//! 2. Take a window of `window_size` characters starting at 0.
//! 3. Advance the start by `window_size - overlap` (at least 1).
//! 4. Stop when the window start reaches the end of the text.
//!
//! Chunk ids are `<doc_id>::chunk::<n>` with `n` counting emitted chunks
//! from 0. [`Chunks`] is a lazy iterator; cloning it or calling
//! [`chunk_document`] again replays the identical sequence.
//!
//! # Example
//!
//! ```rust
//! use research_brief_core::chunk::chunk_document;
//! use research_brief_core::models::{Document, DocumentKind};
//!
//! let doc = Document::new("file::a.md", "pages/a.md", "a", "abcdefghij", DocumentKind::Page);
//! let texts: Vec<String> = chunk_document(&doc, 4, 1).map(|c| c.text).collect();
//! assert_eq!(texts, vec!["abcd", "defg", "ghij", "j"]);
//! ```

use crate::models::{Chunk, Document};

/// Collapse whitespace runs to single spaces and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lazy iterator over the chunks of one document.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    doc: &'a Document,
    text: String,
    /// Byte offset of every char, plus `text.len()` as a final sentinel.
    bounds: Vec<usize>,
    window: usize,
    step: usize,
    start: usize,
    seq: usize,
}

impl Chunks<'_> {
    fn char_len(&self) -> usize {
        self.bounds.len() - 1
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        loop {
            let n = self.char_len();
            if self.window == 0 || self.start >= n {
                return None;
            }

            let end = n.min(self.start + self.window);
            let piece = &self.text[self.bounds[self.start]..self.bounds[end]];

            self.start += self.step;

            if piece.trim().is_empty() {
                continue;
            }

            let chunk = Chunk {
                chunk_id: format!("{}::chunk::{}", self.doc.doc_id, self.seq),
                doc_id: self.doc.doc_id.clone(),
                source: self.doc.source.clone(),
                title: self.doc.title.clone(),
                text: piece.to_string(),
            };
            self.seq += 1;
            return Some(chunk);
        }
    }
}

/// Chunk a document into overlapping windows of `window_size` characters.
///
/// `overlap >= window_size` degrades to an advance of one character rather
/// than stalling. `window_size == 0` yields no chunks.
pub fn chunk_document(doc: &Document, window_size: usize, overlap: usize) -> Chunks<'_> {
    let text = normalize_whitespace(&doc.text);
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());

    Chunks {
        doc,
        text,
        bounds,
        window: window_size,
        step: window_size.saturating_sub(overlap).max(1),
        start: 0,
        seq: 0,
    }
}

/// Chunk every document in order and collect the results.
pub fn chunk_documents(docs: &[Document], window_size: usize, overlap: usize) -> Vec<Chunk> {
    docs.iter()
        .flat_map(|d| chunk_document(d, window_size, overlap))
        .collect()
}
