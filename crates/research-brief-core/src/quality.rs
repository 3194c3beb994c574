//! Accept/abstain decision for a generated answer.
//!
//! Checks run in order and the first failure wins:
//!
//! 1. fewer distinct sources than required
//! 2. no `[n]` citation marker in the answer
//! 3. a long answer (over 800 characters) citing fewer than two sources
//!
//! Abstaining is a normal outcome, not an error. The pipeline swaps the
//! generated text for [`abstention_notice`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

/// Answers longer than this need at least [`MIN_CITATIONS_FOR_LONG_ANSWER`] markers.
pub const LONG_ANSWER_CHARS: usize = 800;
pub const MIN_CITATIONS_FOR_LONG_ANSWER: usize = 2;

pub const REASON_SOURCE_DIVERSITY: &str = "insufficient source diversity.";
pub const REASON_NO_CITATIONS: &str = "no citations found.";
pub const REASON_CITATION_DENSITY: &str = "insufficient citations for answer length.";
pub const REASON_OK: &str = "ok.";

static RE_CITATION: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[(\d+)\]").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Abstain,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Accept => f.write_str("accept"),
            Decision::Abstain => f.write_str("abstain"),
        }
    }
}

/// Gate outcome with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub decision: Decision,
    pub reason: String,
}

impl Verdict {
    fn accept() -> Self {
        Self {
            decision: Decision::Accept,
            reason: REASON_OK.to_string(),
        }
    }

    fn abstain(reason: &str) -> Self {
        Self {
            decision: Decision::Abstain,
            reason: reason.to_string(),
        }
    }

    pub fn is_accept(&self) -> bool {
        self.decision == Decision::Accept
    }
}

/// Distinct citation numbers appearing as `[n]` in `text`.
pub fn citation_markers(text: &str) -> BTreeSet<u64> {
    match RE_CITATION.as_ref() {
        Some(re) => re
            .captures_iter(text)
            .filter_map(|c| c[1].parse::<u64>().ok())
            .collect(),
        None => BTreeSet::new(),
    }
}

/// Decide whether `answer` may be shown.
///
/// Length is measured in characters.
pub fn evaluate<S>(answer: &str, distinct_sources: &BTreeSet<S>, min_sources: usize) -> Verdict {
    if distinct_sources.len() < min_sources {
        return Verdict::abstain(REASON_SOURCE_DIVERSITY);
    }

    let markers = citation_markers(answer);
    if markers.is_empty() {
        return Verdict::abstain(REASON_NO_CITATIONS);
    }

    if answer.chars().count() > LONG_ANSWER_CHARS && markers.len() < MIN_CITATIONS_FOR_LONG_ANSWER {
        return Verdict::abstain(REASON_CITATION_DENSITY);
    }

    Verdict::accept()
}

/// Marker the evaluator looks for to recognise an abstention.
pub const ABSTAINED_MARKER: &str = "**Abstained**";

/// Replacement answer shown when the gate abstains.
pub fn abstention_notice(topic: &str, reason: &str) -> String {
    format!(
        "# Briefing - {}\n\n{}: {}\n\nTry adding more sources or switching to online mode.\n",
        topic, ABSTAINED_MARKER, reason
    )
}
