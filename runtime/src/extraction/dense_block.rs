//! Dense-block fallback for pages without clean article markup.
//!
//! Product landing pages are often built from many small `div`s that
//! readability rejects. This pass picks the single paragraph or container
//! with the most text instead of reconstructing document structure.

use scraper::{Html, Selector};

/// Text of the longest `p`/`div` whose trimmed text exceeds `min_chars`.
///
/// Ties keep the earliest element in document order. Returns an empty string
/// when no container qualifies.
pub fn extract_dense_block(html: &str, min_chars: usize) -> String {
    let Ok(sel) = Selector::parse("p, div") else {
        return String::new();
    };
    let document = Html::parse_document(html);

    let mut best: Option<(usize, String)> = None;
    for el in document.select(&sel) {
        let text = el.text().collect::<String>();
        let trimmed = text.trim();
        let len = trimmed.chars().count();
        if len <= min_chars {
            continue;
        }
        if best.as_ref().map_or(true, |(best_len, _)| len > *best_len) {
            best = Some((len, trimmed.to_string()));
        }
    }

    best.map(|(_, text)| text).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picks_longest_qualifying_block() {
        let html = r#"<html><body>
            <section>
              <p>Free shipping on orders over $40 to anywhere in the country.</p>
              <p>Our Amber Jar candle is hand-poured from soy wax with a cotton wick and burns for sixty hours.</p>
            </section>
        </body></html>"#;
        let text = extract_dense_block(html, 50);
        assert!(text.starts_with("Our Amber Jar candle"));
    }

    #[test]
    fn test_container_text_includes_descendants() {
        let html = r#"<body><div class="hero"><span>Sixty hour burn.</span>
            <span>Cedar, bergamot and smoked vanilla in a reusable amber jar.</span></div></body>"#;
        let text = extract_dense_block(html, 50);
        assert!(text.contains("Sixty hour burn."));
        assert!(text.contains("smoked vanilla"));
    }

    #[test]
    fn test_short_blocks_are_ignored() {
        let html = "<body><p>Buy now</p><div>Only 3 left</div></body>";
        assert_eq!(extract_dense_block(html, 50), "");
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let exactly_fifty = "x".repeat(50);
        let html = format!("<body><p>{exactly_fifty}</p></body>");
        assert_eq!(extract_dense_block(&html, 50), "");

        let fifty_one = "x".repeat(51);
        let html = format!("<body><p>{fifty_one}</p></body>");
        assert_eq!(extract_dense_block(&html, 50), fifty_one);
    }
}
