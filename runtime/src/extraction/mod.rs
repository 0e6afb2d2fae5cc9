//! Content extractors and the merge stage.
//!
//! Three independent strategies read the same document: metadata tags,
//! readability, and the dense-block heuristic. They share no state, so they
//! run concurrently on the blocking pool and are combined only after all
//! have finished.

pub mod dense_block;
pub mod merge;
pub mod metadata;
pub mod readable;

use crate::config::Thresholds;
use merge::Candidates;
use std::sync::Arc;
use tracing::warn;

/// Run all three extractors over `html` concurrently.
///
/// An extractor that panics contributes an empty candidate.
pub async fn extract_candidates(html: Arc<str>, page_url: &str, thresholds: &Thresholds) -> Candidates {
    if html.trim().is_empty() {
        return Candidates::default();
    }

    let meta_html = Arc::clone(&html);
    let readable_html = Arc::clone(&html);
    let dense_html = html;
    let url = page_url.to_string();
    let min_dense = thresholds.min_dense_block_chars;

    let (meta, readable, dense) = tokio::join!(
        tokio::task::spawn_blocking(move || metadata::extract_metadata(&meta_html)),
        tokio::task::spawn_blocking(move || readable::extract_readable_text(&readable_html, &url)),
        tokio::task::spawn_blocking(move || dense_block::extract_dense_block(&dense_html, min_dense)),
    );

    let meta = meta.unwrap_or_else(|e| {
        warn!("metadata extractor failed: {e}");
        metadata::PageMetadata::default()
    });
    let readability = readable.unwrap_or_else(|e| {
        warn!("readability extractor failed: {e}");
        String::new()
    });
    let dense_block = dense.unwrap_or_else(|e| {
        warn!("dense-block extractor failed: {e}");
        String::new()
    });

    Candidates {
        title: meta.title,
        description: meta.description,
        readability,
        dense_block,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_extractors_contribute() {
        let para = "Each Amber Jar candle is hand-poured from domestic soy wax, \
                    scented with cedar and bergamot, and burns for sixty hours.";
        let html = format!(
            r#"<html><head><title>Amber Jar</title>
            <meta name="description" content="Soy candle in a reusable jar"></head>
            <body><article><p>{para}</p><p>{para}</p><p>{para}</p></article></body></html>"#
        );

        let c = extract_candidates(
            Arc::from(html.as_str()),
            "https://northwick.example/amber-jar",
            &Thresholds::default(),
        )
        .await;

        assert_eq!(c.title, "Amber Jar");
        assert_eq!(c.description, "Soy candle in a reusable jar");
        assert!(c.readability.contains("sixty hours"));
        assert!(c.dense_block.contains("sixty hours"));
    }

    #[tokio::test]
    async fn test_empty_document_yields_empty_candidates() {
        let c = extract_candidates(Arc::from(""), "https://x.example/", &Thresholds::default()).await;
        assert_eq!(c, Candidates::default());
    }
}
