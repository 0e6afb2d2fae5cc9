//! `pitchkit extract <url>`: run the full pipeline on one URL.

use super::output;
use crate::config::ExtractorConfig;
use crate::failure::classify_report;
use anyhow::{bail, Result};
use tracing::debug;

/// Run the extract command.
pub async fn run(url: &str, config: &ExtractorConfig, no_browser: bool) -> Result<()> {
    let pipeline = super::build_pipeline(config, no_browser);
    output::note(&format!("Extracting {url}..."));

    let result = pipeline.extract_with_report(url).await;
    if let Err(e) = pipeline.browser().shutdown().await {
        debug!("browser shutdown failed: {e:#}");
    }
    let report = result?;

    if output::is_json() {
        output::print_json(&report);
        return Ok(());
    }

    if let Some(kind) = classify_report(&report) {
        bail!("{}", kind.user_message());
    }

    output::note(&format!(
        "{} chars via {:?}{} in {}ms",
        report.text.chars().count(),
        report.source,
        if report.truncated { " (trimmed)" } else { "" },
        report.elapsed_ms
    ));
    println!("{}", report.text);
    Ok(())
}
