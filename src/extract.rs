//! Plain-text extraction for PDFs, HTML pages, and text files.
//!
//! Sources hand over raw bytes plus a content type; this module returns
//! UTF-8 text. HTML is reduced to its visible text: script, style, and
//! page chrome (navigation, header, footer) are dropped.

use std::path::Path;

use scraper::node::Node;
use scraper::{ElementRef, Html};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_HTML: &str = "text/html";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_TEXT: &str = "text/plain";

/// Elements whose text never counts as page content.
const SKIP_ELEMENTS: &[&str] = &[
    "head", "script", "style", "noscript", "iframe", "svg", "nav", "header", "footer", "aside",
    "form",
];

/// Extraction error. Callers decide whether to skip the item or fail.
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedContentType(String),
    Pdf(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedContentType(ct) => {
                write!(f, "unsupported content-type: {}", ct)
            }
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Content type for a local file, by extension. `None` means "not a source".
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "html" | "htm" => Some(MIME_HTML),
        "md" => Some(MIME_MARKDOWN),
        "txt" => Some(MIME_TEXT),
        _ => None,
    }
}

/// Normalize an HTTP `Content-Type` header to one of the supported types.
///
/// Parameters (`; charset=...`) are ignored. Unknown text types are
/// treated as HTML, since web pages often mislabel themselves.
pub fn content_type_from_header(header: Option<&str>) -> &'static str {
    let mime = header
        .and_then(|h| h.split(';').next())
        .map(|m| m.trim().to_ascii_lowercase())
        .unwrap_or_default();
    match mime.as_str() {
        MIME_PDF => MIME_PDF,
        MIME_TEXT => MIME_TEXT,
        MIME_MARKDOWN => MIME_MARKDOWN,
        _ => MIME_HTML,
    }
}

/// Extract plain text from `bytes` of the given content type.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_HTML => Ok(html_to_text(&String::from_utf8_lossy(bytes))),
        MIME_MARKDOWN | MIME_TEXT => Ok(String::from_utf8_lossy(bytes).into_owned()),
        _ => Err(ExtractError::UnsupportedContentType(
            content_type.to_string(),
        )),
    }
}

/// `pdf-extract` panics on some malformed files; a panic is reported as a
/// PDF error like any other.
fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text.trim().to_string()),
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("parser panicked".to_string())),
    }
}

/// Visible text of an HTML document, one text node per line.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts = Vec::new();
    collect_text(document.root_element(), &mut parts);
    parts.join("\n")
}

fn collect_text(element: ElementRef<'_>, parts: &mut Vec<String>) {
    if SKIP_ELEMENTS.contains(&element.value().name()) {
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, parts);
                }
            }
            _ => {}
        }
    }
}
