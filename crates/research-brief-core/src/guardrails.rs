//! Ingestion guardrails: prompt-injection detection and PII redaction.
//!
//! Both checks run on raw document text before chunking, so nothing that
//! reaches an index or the generator has skipped them.
//!
//! - [`detect_injection`] flags a document containing any of a fixed set of
//!   injection phrases. Flagged documents are dropped whole.
//! - [`redact_pii`] replaces emails, phone-like digit runs, and IBAN-like
//!   codes with fixed placeholders. It is total and idempotent.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::models::Document;

pub const EMAIL_PLACEHOLDER: &str = "[REDACTED_EMAIL]";
pub const PHONE_PLACEHOLDER: &str = "[REDACTED_PHONE]";
pub const IBAN_PLACEHOLDER: &str = "[REDACTED_IBAN]";

/// Minimum number of digits a separator-laden run needs to count as a phone number.
const MIN_PHONE_DIGITS: usize = 9;

/// A named injection phrase pattern.
pub struct InjectionPattern {
    pub name: &'static str,
    pub regex: &'static LazyLock<Option<Regex>>,
}

macro_rules! guard_pattern {
    ($name:ident, $regex_str:expr) => {
        static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($regex_str).ok());
    };
}

guard_pattern!(RE_IGNORE_INSTRUCTIONS, r"(?i)ignore (all|previous) instructions");
guard_pattern!(RE_SYSTEM_PROMPT, r"(?i)system prompt");
guard_pattern!(RE_DEVELOPER_MESSAGE, r"(?i)developer message");
guard_pattern!(RE_DO_NOT_FOLLOW, r"(?i)do not follow");
guard_pattern!(RE_YOU_ARE_NOW, r"(?i)you are now");
guard_pattern!(RE_EXFILTRATE, r"(?i)exfiltrate");

guard_pattern!(RE_EMAIL, r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}");
guard_pattern!(RE_PHONE, r"\+?\d[\d\s().-]{7,}\d");
guard_pattern!(RE_IBAN, r"(?i)\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b");

/// All injection patterns, in evaluation order.
pub fn injection_patterns() -> Vec<InjectionPattern> {
    vec![
        InjectionPattern {
            name: "ignore_instructions",
            regex: &RE_IGNORE_INSTRUCTIONS,
        },
        InjectionPattern {
            name: "system_prompt",
            regex: &RE_SYSTEM_PROMPT,
        },
        InjectionPattern {
            name: "developer_message",
            regex: &RE_DEVELOPER_MESSAGE,
        },
        InjectionPattern {
            name: "do_not_follow",
            regex: &RE_DO_NOT_FOLLOW,
        },
        InjectionPattern {
            name: "you_are_now",
            regex: &RE_YOU_ARE_NOW,
        },
        InjectionPattern {
            name: "exfiltrate",
            regex: &RE_EXFILTRATE,
        },
    ]
}

/// Name of the first injection pattern found in `text`, if any.
pub fn find_injection(text: &str) -> Option<&'static str> {
    injection_patterns().into_iter().find_map(|p| {
        p.regex
            .as_ref()
            .filter(|re| re.is_match(text))
            .map(|_| p.name)
    })
}

/// True when `text` contains any known prompt-injection phrase.
pub fn detect_injection(text: &str) -> bool {
    find_injection(text).is_some()
}

/// Replace emails, phone numbers, and IBAN-like codes with placeholders.
///
/// Order matters: emails first (they may contain digits), then phones, then
/// IBANs. Phone candidates with fewer than nine digits (dates, years,
/// short codes) are left alone. Placeholders contain no digits or `@`, so a
/// second pass finds nothing new.
pub fn redact_pii(text: &str) -> String {
    let mut out = text.to_string();

    if let Some(re) = RE_EMAIL.as_ref() {
        out = re.replace_all(&out, EMAIL_PLACEHOLDER).into_owned();
    }

    if let Some(re) = RE_PHONE.as_ref() {
        out = re
            .replace_all(&out, |caps: &Captures| {
                let m = &caps[0];
                if m.chars().filter(|c| c.is_ascii_digit()).count() >= MIN_PHONE_DIGITS {
                    PHONE_PLACEHOLDER.to_string()
                } else {
                    m.to_string()
                }
            })
            .into_owned();
    }

    if let Some(re) = RE_IBAN.as_ref() {
        out = re.replace_all(&out, IBAN_PLACEHOLDER).into_owned();
    }

    out
}

/// Outcome of screening one document.
#[derive(Debug, Clone, PartialEq)]
pub enum Screened {
    /// Safe to index; text already redacted.
    Accepted(Document),
    /// Dropped because an injection pattern matched.
    Rejected { doc_id: String, pattern: &'static str },
}

/// Run both guardrails over a document: reject on injection, else redact.
pub fn screen(doc: &Document) -> Screened {
    match find_injection(&doc.text) {
        Some(pattern) => Screened::Rejected {
            doc_id: doc.doc_id.clone(),
            pattern,
        },
        None => Screened::Accepted(doc.with_text(redact_pii(&doc.text))),
    }
}
