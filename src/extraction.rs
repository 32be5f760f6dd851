//! Structured extraction of model output
//!
//! Coerces free-form model text into a `StructuredReport`. Strategies run in
//! order until one yields a candidate:
//!
//! 1. direct parse of the trimmed text
//! 2. embedded `{...}` spans found inside surrounding prose
//! 3. heuristic split on numbered-list markers, or at the character midpoint
//!
//! Whatever is still empty afterwards is defaulted field by field, so
//! `extract` never fails.

use crate::models::{RawModelOutput, StructuredReport};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_SUMMARY: &str =
    "Kondisi keuangan Anda bulan ini memerlukan perhatian. Tinjau kembali pemasukan dan pengeluaran Anda.";

pub const DEFAULT_ADVICE: &str = "1. **Catat setiap pengeluaran** agar pola belanja terlihat jelas.\n2. **Tetapkan anggaran bulanan** untuk setiap kategori pengeluaran.";

lazy_static! {
    static ref NUMBERED_MARKER: Regex =
        Regex::new(r"\d+\.\s+").expect("numbered marker pattern is valid");
}

/// Which strategy produced the candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    Direct,
    Substring,
    Heuristic,
}

impl ExtractionStrategy {
    /// Heuristic results are the low-confidence path
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, ExtractionStrategy::Heuristic)
    }
}

/// A candidate failed validation because one or both fields are empty
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("report candidate is missing: {}", .missing.join(", "))]
pub struct ShapeViolation {
    pub missing: Vec<&'static str>,
}

/// Parsed but unvalidated report
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReportCandidate {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub advice: Option<String>,
}

impl ReportCandidate {
    fn has_summary(&self) -> bool {
        is_filled(self.summary.as_deref())
    }

    fn has_advice(&self) -> bool {
        is_filled(self.advice.as_deref())
    }

    /// At least one field carries text
    pub fn is_usable(&self) -> bool {
        self.has_summary() || self.has_advice()
    }

    pub fn validate(&self) -> Result<StructuredReport, ShapeViolation> {
        let mut missing = Vec::new();
        if !self.has_summary() {
            missing.push("summary");
        }
        if !self.has_advice() {
            missing.push("advice");
        }

        match (&self.summary, &self.advice) {
            (Some(summary), Some(advice)) if missing.is_empty() => Ok(StructuredReport {
                summary: summary.clone(),
                advice: advice.clone(),
            }),
            _ => Err(ShapeViolation { missing }),
        }
    }

    /// Substitute the default text for each empty field independently
    pub fn with_defaults(self) -> StructuredReport {
        let summary = match self.summary {
            Some(s) if is_filled(Some(s.as_str())) => s,
            _ => {
                debug!("summary missing from model output, using default");
                DEFAULT_SUMMARY.to_string()
            }
        };

        let advice = match self.advice {
            Some(a) if is_filled(Some(a.as_str())) => a,
            _ => {
                debug!("advice missing from model output, using default");
                DEFAULT_ADVICE.to_string()
            }
        };

        StructuredReport { summary, advice }
    }
}

fn is_filled(field: Option<&str>) -> bool {
    field.map(|s| !s.trim().is_empty()).unwrap_or(false)
}

/// Candidate plus the strategy that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub candidate: ReportCandidate,
    pub strategy: ExtractionStrategy,
}

impl Extraction {
    pub fn into_report(self) -> StructuredReport {
        self.candidate.with_defaults()
    }
}

/// Extract a report from raw model output. Never fails.
pub fn extract(raw: &RawModelOutput) -> StructuredReport {
    extract_candidate(raw).into_report()
}

/// Run the strategies in order and return the first candidate found
pub fn extract_candidate(raw: &RawModelOutput) -> Extraction {
    let text = raw.as_str();

    if let Some(candidate) = parse_candidate(text) {
        return Extraction {
            candidate,
            strategy: ExtractionStrategy::Direct,
        };
    }

    if let Some(candidate) = find_embedded_candidate(text) {
        debug!("report recovered from embedded JSON span");
        return Extraction {
            candidate,
            strategy: ExtractionStrategy::Substring,
        };
    }

    warn!(
        raw = %raw.preview(200),
        "model output is not structured, falling back to heuristic split"
    );

    Extraction {
        candidate: heuristic_split(text),
        strategy: ExtractionStrategy::Heuristic,
    }
}

/// Parse text as a `{summary, advice}` object.
///
/// Only JSON objects qualify; string members are required when present and
/// at least one must be non-blank. Unknown members are ignored.
pub fn parse_candidate(text: &str) -> Option<ReportCandidate> {
    let value: serde_json::Value = serde_json::from_str(text.trim()).ok()?;
    if !value.is_object() {
        return None;
    }

    let candidate: ReportCandidate = serde_json::from_value(value).ok()?;
    if candidate.is_usable() {
        Some(candidate)
    } else {
        None
    }
}

//
// ================= Structural Extractor =================
//

/// Best-effort search for a report object embedded in prose.
///
/// Tries every balanced `{...}` span in order of its opening brace, then the
/// widest first-`{`-to-last-`}` span. Returns `None` when nothing parses.
pub fn find_embedded_candidate(text: &str) -> Option<ReportCandidate> {
    let found = text
        .char_indices()
        .filter(|&(_, ch)| ch == '{')
        .filter_map(|(start, _)| balanced_span(text, start))
        .find_map(parse_candidate);

    found.or_else(|| greedy_span(text).and_then(parse_candidate))
}

/// Span from the `{` at `start` to its matching `}`, skipping braces inside
/// JSON string literals. `None` if the span never closes.
pub fn balanced_span(text: &str, start: usize) -> Option<&str> {
    let tail = text.get(start..)?;
    if !tail.starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in tail.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&tail[..=offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// First `{` through last `}`
pub fn greedy_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start < end {
        Some(&text[start..=end])
    } else {
        None
    }
}

//
// ================= Heuristic Split =================
//

/// Split prose into summary and advice.
///
/// With two or more numbered segments the first half (rounded up) becomes
/// the summary and the rest the advice. Otherwise the text is cut at its
/// character midpoint.
pub fn heuristic_split(text: &str) -> ReportCandidate {
    let text = text.trim();

    let segments: Vec<&str> = NUMBERED_MARKER
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let (summary, advice) = if segments.len() > 1 {
        let mid = (segments.len() + 1) / 2;
        (segments[..mid].join(" "), segments[mid..].join("\n"))
    } else {
        split_at_midpoint(text)
    };

    ReportCandidate {
        summary: Some(summary),
        advice: Some(advice),
    }
}

fn split_at_midpoint(text: &str) -> (String, String) {
    let mid_chars = text.chars().count() / 2;
    let mid = text
        .char_indices()
        .nth(mid_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());

    let (head, tail) = text.split_at(mid);
    (head.trim().to_string(), tail.trim().to_string())
}
