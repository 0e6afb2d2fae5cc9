//! Merge extractor output into one bounded, model-ready string.

use crate::config::Thresholds;
use regex::Regex;
use std::sync::OnceLock;

/// Placed where the middle of over-budget text was cut.
pub const ELISION_MARKER: &str = "\n...\n";

fn blank_lines() -> &'static Regex {
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();
    BLANK_LINES.get_or_init(|| Regex::new(r"\n{2,}").expect("blank-line regex is valid"))
}

/// Which extractor produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Title,
    Description,
    Readability,
    DenseBlock,
}

/// Output of all extractors for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    pub title: String,
    pub description: String,
    pub readability: String,
    pub dense_block: String,
}

/// Final merged text plus what went into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedContent {
    pub text: String,
    pub used: Vec<CandidateKind>,
    pub truncated: bool,
}

/// Merge candidates in priority order and trim to the content budget.
///
/// Title and description are kept whenever non-empty; readability text only
/// above its minimum length, the dense block only above its own.
pub fn merge_candidates(candidates: &Candidates, thresholds: &Thresholds) -> MergedContent {
    let ordered = [
        (CandidateKind::Title, candidates.title.trim(), 0),
        (CandidateKind::Description, candidates.description.trim(), 0),
        (
            CandidateKind::Readability,
            candidates.readability.trim(),
            thresholds.min_readability_chars,
        ),
        (
            CandidateKind::DenseBlock,
            candidates.dense_block.trim(),
            thresholds.min_dense_block_chars,
        ),
    ];

    let mut used = Vec::new();
    let mut parts = Vec::new();
    for (kind, text, min_chars) in ordered {
        if text.is_empty() || text.chars().count() <= min_chars {
            continue;
        }
        used.push(kind);
        parts.push(text);
    }

    let joined = parts.join("\n\n");
    let collapsed = blank_lines().replace_all(&joined, "\n");
    let cleaned = collapsed.trim();

    let (text, truncated) = trim_to_budget(cleaned, thresholds);
    MergedContent {
        text,
        used,
        truncated,
    }
}

/// Keep head and tail of over-budget text, dropping the middle.
pub fn trim_to_budget(text: &str, thresholds: &Thresholds) -> (String, bool) {
    let total = text.chars().count();
    if total <= thresholds.content_budget_chars {
        return (text.to_string(), false);
    }

    let head: String = text.chars().take(thresholds.head_keep_chars).collect();
    let tail_start = total - thresholds.tail_keep_chars.min(total);
    let tail: String = text.chars().skip(tail_start).collect();

    (format!("{head}{ELISION_MARKER}{tail}"), true)
}
