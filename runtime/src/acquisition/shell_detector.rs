//! SPA shell detection.
//!
//! Decides from raw HTML alone whether a static response is a real content
//! page or a client-rendered shell that needs a browser. Misses are cheap
//! (thinner text); false alarms cost a browser render, so the checks stay
//! conservative.

use crate::config::Thresholds;

/// Markers left by client-side frameworks in the server response.
const HYDRATION_MARKERS: &[&str] = &[
    r#"id="root""#,
    r#"id="app""#,
    r#"id="__next""#,
    "__NEXT_DATA__",
    "window.__NUXT__",
    r#"id="__nuxt""#,
    r#"id="___gatsby""#,
    "data-reactroot",
    "ng-version",
];

/// Why a document was (or was not) classified as a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellVerdict {
    /// No HTML at all.
    Missing,
    /// Fewer characters than the static minimum.
    TooShort { chars: usize },
    /// A framework hydration marker was found.
    HydrationMarker { marker: &'static str },
    /// More script tags than the static maximum.
    ScriptHeavy { scripts: usize },
    /// Looks like a server-rendered page.
    Static,
}

impl ShellVerdict {
    /// Whether the page should be rendered in a browser.
    pub fn needs_render(&self) -> bool {
        !matches!(self, Self::Static)
    }
}

impl std::fmt::Display for ShellVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "no static html"),
            Self::TooShort { chars } => write!(f, "static html too short ({chars} chars)"),
            Self::HydrationMarker { marker } => write!(f, "hydration marker {marker}"),
            Self::ScriptHeavy { scripts } => write!(f, "{scripts} script tags"),
            Self::Static => write!(f, "static content"),
        }
    }
}

/// Classify a static response, keeping the reason.
pub fn classify_document(html: Option<&str>, thresholds: &Thresholds) -> ShellVerdict {
    let html = match html {
        Some(h) if !h.trim().is_empty() => h,
        _ => return ShellVerdict::Missing,
    };

    let chars = html.chars().count();
    if chars < thresholds.min_static_html_chars {
        return ShellVerdict::TooShort { chars };
    }

    if let Some(marker) = HYDRATION_MARKERS.iter().find(|m| html.contains(**m)) {
        return ShellVerdict::HydrationMarker { marker: *marker };
    }

    let scripts = count_script_tags(html);
    if scripts > thresholds.max_static_script_tags {
        return ShellVerdict::ScriptHeavy { scripts };
    }

    ShellVerdict::Static
}

/// Whether the static document is missing, too short, hydrates on the
/// client, or carries enough scripts that a browser render should replace it.
pub fn looks_like_dynamic_shell(html: Option<&str>, thresholds: &Thresholds) -> bool {
    classify_document(html, thresholds).needs_render()
}

fn count_script_tags(html: &str) -> usize {
    html.to_ascii_lowercase().matches("<script").count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded_page(extra_head: &str) -> String {
        let para = "<p>Hand-poured soy candles in reusable amber jars, scented with cedar and bergamot.</p>\n";
        format!(
            "<html><head><title>Candles</title>{extra_head}</head><body>{}</body></html>",
            para.repeat(40)
        )
    }

    #[test]
    fn test_missing_and_empty_need_render() {
        let t = Thresholds::default();
        assert!(looks_like_dynamic_shell(None, &t));
        assert!(looks_like_dynamic_shell(Some(""), &t));
        assert!(looks_like_dynamic_shell(Some("  \n "), &t));
    }

    #[test]
    fn test_short_root_shell_needs_render() {
        let t = Thresholds::default();
        let html = r#"<html><head><script src="/static/js/main.js"></script></head><body><div id="root"></div></body></html>"#;
        assert!(html.len() < 2000);
        assert!(looks_like_dynamic_shell(Some(html), &t));
    }

    #[test]
    fn test_long_plain_page_is_static() {
        let t = Thresholds::default();
        let html = padded_page("");
        assert!(html.chars().count() >= 2000);
        assert_eq!(classify_document(Some(&html), &t), ShellVerdict::Static);
        assert!(!looks_like_dynamic_shell(Some(&html), &t));
    }

    #[test]
    fn test_long_page_with_next_data_needs_render() {
        let t = Thresholds::default();
        let html = padded_page(r#"<script id="__NEXT_DATA__" type="application/json">{}</script>"#);
        assert_eq!(
            classify_document(Some(&html), &t),
            ShellVerdict::HydrationMarker {
                marker: "__NEXT_DATA__"
            }
        );
    }

    #[test]
    fn test_long_server_rendered_vue_page_is_static() {
        let t = Thresholds::default();
        let para = "<p>Hand-poured soy candles in reusable amber jars, scented with cedar and bergamot.</p>";
        let html = format!(
            r#"<html><head><title>Candles</title></head><body><div class="storefront" data-server-rendered="true">{}</div></body></html>"#,
            para.repeat(40)
        );
        assert_eq!(classify_document(Some(&html), &t), ShellVerdict::Static);
    }

    #[test]
    fn test_script_count_threshold() {
        let t = Thresholds::default();
        let twenty = padded_page(&"<script>1</script>".repeat(20));
        assert!(!looks_like_dynamic_shell(Some(&twenty), &t));

        let twenty_one = padded_page(&"<SCRIPT>1</SCRIPT>".repeat(21));
        assert_eq!(
            classify_document(Some(&twenty_one), &t),
            ShellVerdict::ScriptHeavy { scripts: 21 }
        );
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let t = Thresholds::default();
        // 1000 two-byte characters: 2000 bytes but only 1000 chars.
        let html = "é".repeat(1000);
        assert_eq!(
            classify_document(Some(&html), &t),
            ShellVerdict::TooShort { chars: 1000 }
        );
    }
}
