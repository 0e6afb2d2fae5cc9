//! Map extraction outcomes to what the person in the funnel should see.
//!
//! A bot-protected site is not worth retrying; the user is asked to paste
//! the page content instead. Anything else may be transient.

use crate::pipeline::ExtractionReport;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Signatures left in error messages by bot protection. Status codes must
/// stand alone so ports and byte counts do not match.
fn block_signatures() -> &'static Regex {
    static SIGNATURES: OnceLock<Regex> = OnceLock::new();
    SIGNATURES.get_or_init(|| {
        Regex::new(r"(?i)\b(?:403|429)\b|forbidden|too many requests|access denied|captcha")
            .expect("block signature regex is valid")
    })
}

/// User-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The site refused automated access; ask for manual input.
    Blocked,
    /// Nothing usable was found on the page; ask for manual input.
    NeedsManualInput,
    /// Probably transient; the user can try again.
    Retryable,
}

impl FailureKind {
    pub fn user_message(self) -> &'static str {
        match self {
            Self::Blocked => {
                "This site blocks automated access. Paste a short description of \
                 the product instead."
            }
            Self::NeedsManualInput => {
                "We couldn't find any readable content on that page. Paste a \
                 short description of the product instead."
            }
            Self::Retryable => "We couldn't reach that page right now. Please try again.",
        }
    }

    /// Whether the caller should switch to manual input.
    pub fn wants_manual_input(self) -> bool {
        !matches!(self, Self::Retryable)
    }
}

/// Classify an error message.
pub fn classify_failure(message: &str) -> FailureKind {
    if block_signatures().is_match(message) {
        FailureKind::Blocked
    } else {
        FailureKind::Retryable
    }
}

/// Classify a successful extraction. `None` when the text is usable.
pub fn classify_report(report: &ExtractionReport) -> Option<FailureKind> {
    if !report.is_empty() {
        return None;
    }
    let blocked = report.looks_blocked()
        || report
            .dynamic_error
            .as_deref()
            .is_some_and(|e| classify_failure(e) == FailureKind::Blocked);
    Some(if blocked {
        FailureKind::Blocked
    } else {
        FailureKind::NeedsManualInput
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::DocumentSource;

    fn report(text: &str, status: Option<u16>, dynamic_error: Option<&str>) -> ExtractionReport {
        ExtractionReport {
            url: "https://shop.example.com/".to_string(),
            text: text.to_string(),
            source: DocumentSource::Empty,
            static_status: status,
            render_reason: None,
            dynamic_error: dynamic_error.map(str::to_string),
            candidates_used: Vec::new(),
            truncated: false,
            elapsed_ms: 1,
        }
    }

    #[test]
    fn test_block_signatures() {
        assert_eq!(classify_failure("HTTP 403 Forbidden"), FailureKind::Blocked);
        assert_eq!(classify_failure("429 Too Many Requests"), FailureKind::Blocked);
        assert_eq!(classify_failure("Access Denied by edge"), FailureKind::Blocked);
        assert_eq!(classify_failure("please solve the CAPTCHA"), FailureKind::Blocked);
    }

    #[test]
    fn test_other_errors_are_retryable() {
        assert_eq!(
            classify_failure("navigation timed out after 15000ms"),
            FailureKind::Retryable
        );
        assert_eq!(
            classify_failure("net::ERR_NAME_NOT_RESOLVED"),
            FailureKind::Retryable
        );
        assert_eq!(
            classify_failure("no static html for http://127.0.0.1:40312/"),
            FailureKind::Retryable
        );
        assert!(!FailureKind::Retryable.wants_manual_input());
    }

    #[test]
    fn test_report_with_text_is_fine() {
        assert_eq!(classify_report(&report("Hello", Some(200), None)), None);
    }

    #[test]
    fn test_empty_report_distinguishes_blocked() {
        assert_eq!(
            classify_report(&report("", Some(403), Some("navigation timed out after 15000ms"))),
            Some(FailureKind::Blocked)
        );
        assert_eq!(
            classify_report(&report("", Some(200), None)),
            Some(FailureKind::NeedsManualInput)
        );
        assert_eq!(
            classify_report(&report("", None, Some("net::ERR_ABORTED 429"))),
            Some(FailureKind::Blocked)
        );
    }
}
