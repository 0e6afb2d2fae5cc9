//! Page metadata: `<title>` and the meta description.

use scraper::{Html, Selector};

/// Title and description of a page. Missing values are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
}

/// Extract the document title and `<meta name="description">` content.
pub fn extract_metadata(html: &str) -> PageMetadata {
    let document = Html::parse_document(html);
    PageMetadata {
        title: title(&document),
        description: description(&document),
    }
}

fn title(document: &Html) -> String {
    let Ok(sel) = Selector::parse("title") else {
        return String::new();
    };
    document
        .select(&sel)
        .next()
        .map(|el| normalize(&el.text().collect::<String>()))
        .unwrap_or_default()
}

fn description(document: &Html) -> String {
    let Ok(sel) = Selector::parse("meta[name]") else {
        return String::new();
    };
    document
        .select(&sel)
        .find(|el| {
            el.value()
                .attr("name")
                .is_some_and(|n| n.trim().eq_ignore_ascii_case("description"))
        })
        .and_then(|el| el.value().attr("content"))
        .map(normalize)
        .unwrap_or_default()
}

/// Collapse internal whitespace runs to single spaces and trim.
fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_and_description() {
        let html = r#"<html><head>
            <title>
                Amber Jar Candle | Northwick
            </title>
            <meta name="Description" content="Hand-poured soy candle, 60 hour burn.">
        </head><body></body></html>"#;
        let meta = extract_metadata(html);
        assert_eq!(meta.title, "Amber Jar Candle | Northwick");
        assert_eq!(meta.description, "Hand-poured soy candle, 60 hour burn.");
    }

    #[test]
    fn test_missing_values_are_empty() {
        let meta = extract_metadata("<html><body><p>nothing here</p></body></html>");
        assert_eq!(meta, PageMetadata::default());
    }

    #[test]
    fn test_other_meta_tags_ignored() {
        let html = r#"<head><meta name="viewport" content="width=device-width">
            <meta property="og:description" content="og text"></head>"#;
        assert_eq!(extract_metadata(html).description, "");
    }
}
