//! Main-content extraction with Mozilla's readability algorithm.

use std::io::Cursor;
use tracing::debug;
use url::Url;

/// Base used when the page URL cannot be parsed; only affects link resolution.
const FALLBACK_BASE: &str = "http://localhost/";

/// Plain text of the page's primary article, or an empty string.
pub fn extract_readable_text(html: &str, page_url: &str) -> String {
    let parsed_url = match Url::parse(page_url).or_else(|_| Url::parse(FALLBACK_BASE)) {
        Ok(u) => u,
        Err(_) => return String::new(),
    };

    let mut cursor = Cursor::new(html.as_bytes());
    match readability::extractor::extract(&mut cursor, &parsed_url) {
        Ok(product) => product.text.trim().to_string(),
        Err(e) => {
            debug!("readability found no article in {page_url}: {e}");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_text_is_extracted_without_chrome() {
        let body = "The Amber Jar candle is poured by hand in small batches using \
                    domestic soy wax and a cotton wick. Each jar burns for sixty hours \
                    and carries notes of cedar, bergamot and smoked vanilla. ";
        let html = format!(
            r#"<html><head><title>Amber Jar</title></head><body>
            <nav><a href="/">Home</a> <a href="/shop">Shop</a></nav>
            <article><h1>Amber Jar</h1><p>{body}</p><p>{body}</p><p>{body}</p></article>
            <footer>Copyright Northwick</footer>
            </body></html>"#
        );

        let text = extract_readable_text(&html, "https://northwick.example/amber-jar");
        assert!(text.contains("cedar, bergamot"));
        assert!(!text.contains("Copyright Northwick"));
    }

    #[test]
    fn test_bad_url_still_extracts() {
        let html = "<html><body><article><p>short</p></article></body></html>";
        // Must not panic on an unparsable URL.
        let _ = extract_readable_text(html, "not a url");
    }
}
