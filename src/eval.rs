//! Batch evaluation over a JSONL dataset of briefing cases.
//!
//! Each non-blank line is one case:
//!
//! ```json
//! {"id": "agentic-cyber", "topic": "agentic AI in cyber", "mode": "offline",
//!  "urls": [], "min_sources": 2, "must_cite": true}
//! ```
//!
//! Every case is run through the pipeline and scored. A case passes when:
//! - it cites at least one source, or does not have to (`must_cite = false`), or abstained;
//! - it drew on at least `min_sources` distinct sources, or abstained.
//!
//! Abstaining is always an acceptable outcome; confidently answering
//! without evidence is not. A run that errors counts as a failed case.

use anyhow::{Context, Result};
use research_brief_core::citations::distinct_sources;
use research_brief_core::quality::{citation_markers, ABSTAINED_MARKER};
use research_brief_core::{Pipeline, RunMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default report location.
pub const DEFAULT_REPORT_PATH: &str = "data/eval/latest.json";

/// One evaluation case.
#[derive(Debug, Clone, Deserialize)]
pub struct EvalCase {
    pub id: String,
    pub topic: String,
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default = "default_min_sources")]
    pub min_sources: usize,
    #[serde(default = "default_must_cite")]
    pub must_cite: bool,
}

fn default_min_sources() -> usize {
    2
}

fn default_must_cite() -> bool {
    true
}

/// Measurements taken from one answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scores {
    pub has_citations: bool,
    pub n_citations: usize,
    pub source_diversity_ok: bool,
    pub n_sources: usize,
    pub abstained: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub id: String,
    pub topic: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<Scores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub failed: usize,
    pub results: Vec<CaseResult>,
}

/// Parse a JSONL dataset, skipping blank lines.
pub fn load_cases(path: &Path) -> Result<Vec<EvalCase>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Invalid case on line {} of {}", i + 1, path.display()))
        })
        .collect()
}

/// Score an answer against the case's thresholds.
pub fn score(answer: &str, n_sources: usize, min_sources: usize) -> Scores {
    let cites = citation_markers(answer);
    Scores {
        has_citations: !cites.is_empty(),
        n_citations: cites.len(),
        source_diversity_ok: n_sources >= min_sources,
        n_sources,
        abstained: answer.contains(ABSTAINED_MARKER) || answer.contains("Abstained:"),
    }
}

/// Whether `scores` satisfy `case`.
pub fn passes(case: &EvalCase, scores: &Scores) -> bool {
    if case.must_cite && !scores.has_citations && !scores.abstained {
        return false;
    }
    if !scores.source_diversity_ok && !scores.abstained {
        return false;
    }
    true
}

/// Run every case in order.
pub fn run_cases(pipeline: &Pipeline, cases: &[EvalCase]) -> EvalReport {
    let mut results = Vec::with_capacity(cases.len());

    for case in cases {
        let result = match pipeline.run(&case.topic, case.mode, &case.urls) {
            Ok(run) => {
                let n_sources = distinct_sources(&run.retrieved).len();
                let scores = score(&run.answer, n_sources, case.min_sources);
                let ok = passes(case, &scores);
                info!(case = %case.id, ok, n_sources, "eval case scored");
                CaseResult {
                    id: case.id.clone(),
                    topic: case.topic.clone(),
                    ok,
                    scores: Some(scores),
                    trace: Some(run.trace_location),
                    error: None,
                }
            }
            Err(e) => {
                let message = format!("{}: {:#}", e, e.source);
                warn!(case = %case.id, error = %message, "eval case errored");
                CaseResult {
                    id: case.id.clone(),
                    topic: case.topic.clone(),
                    ok: false,
                    scores: None,
                    trace: None,
                    error: Some(message),
                }
            }
        };
        results.push(result);
    }

    let failed = results.iter().filter(|r| !r.ok).count();
    EvalReport { failed, results }
}

/// Write `report` as pretty JSON, creating parent directories.
pub fn write_report(report: &EvalReport, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(report)?)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn case(must_cite: bool) -> EvalCase {
        EvalCase {
            id: "c".to_string(),
            topic: "t".to_string(),
            mode: RunMode::Offline,
            urls: vec![],
            min_sources: 2,
            must_cite,
        }
    }

    #[test]
    fn test_load_cases_with_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dataset.jsonl");
        std::fs::write(
            &path,
            "{\"id\": \"a\", \"topic\": \"agentic ai\"}\n\n{\"id\": \"b\", \"topic\": \"rust\", \"mode\": \"online\", \"urls\": [\"https://example.com\"], \"min_sources\": 1, \"must_cite\": false}\n",
        )
        .unwrap();

        let cases = load_cases(&path).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].mode, RunMode::Offline);
        assert_eq!(cases[0].min_sources, 2);
        assert!(cases[0].must_cite);
        assert_eq!(cases[1].mode, RunMode::Online);
        assert_eq!(cases[1].urls, vec!["https://example.com"]);
        assert!(!cases[1].must_cite);
    }

    #[test]
    fn test_load_cases_reports_bad_line() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dataset.jsonl");
        std::fs::write(&path, "{\"id\": \"a\", \"topic\": \"x\"}\nnot json\n").unwrap();
        let err = load_cases(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_score_counts_distinct_markers() {
        let s = score("Claim [1]. Again [1]. Other [3].", 3, 2);
        assert!(s.has_citations);
        assert_eq!(s.n_citations, 2);
        assert!(s.source_diversity_ok);
        assert!(!s.abstained);
    }

    #[test]
    fn test_score_detects_abstention() {
        let s = score("# Briefing - x\n\n**Abstained**: no citations found.\n", 1, 2);
        assert!(s.abstained);
        assert!(!s.source_diversity_ok);
        assert!(score("Abstained: thin evidence", 0, 2).abstained);
    }

    #[test]
    fn test_abstention_always_passes() {
        let s = score("**Abstained**: insufficient source diversity.", 0, 2);
        assert!(passes(&case(true), &s));
    }

    #[test]
    fn test_uncited_answer_fails_when_citing_required() {
        let s = score("Confident claims with no markers.", 3, 2);
        assert!(!passes(&case(true), &s));
        assert!(passes(&case(false), &s));
    }

    #[test]
    fn test_low_diversity_fails_even_without_cite_requirement() {
        let s = score("Claim [1].", 1, 2);
        assert!(!passes(&case(false), &s));
    }

    #[test]
    fn test_write_report_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("eval").join("latest.json");
        let report = EvalReport {
            failed: 0,
            results: vec![CaseResult {
                id: "a".to_string(),
                topic: "x".to_string(),
                ok: true,
                scores: Some(score("[1]", 2, 2)),
                trace: Some("runs/a.json".to_string()),
                error: None,
            }],
        };
        write_report(&report, &path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["failed"], 0);
        assert_eq!(json["results"][0]["scores"]["n_citations"], 1);
        assert!(json["results"][0].get("error").is_none());
    }
}
