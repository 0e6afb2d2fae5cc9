//! `pitchkit classify <file>`: run the SPA shell heuristic on saved HTML.

use super::output;
use crate::acquisition::shell_detector::classify_document;
use crate::config::Thresholds;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// Run the classify command. `-` reads from stdin.
pub fn run(path: &Path) -> Result<()> {
    let html = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };

    let verdict = classify_document(Some(&html), &Thresholds::default());

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "needs_render": verdict.needs_render(),
            "reason": verdict.to_string(),
            "chars": html.chars().count(),
        }));
    } else if verdict.needs_render() {
        println!("dynamic shell: {verdict}");
    } else {
        println!("static: {verdict}");
    }
    Ok(())
}
