//! Icon link harvesting from HTML documents.
//!
//! Pages in the wild are frequently malformed, so this scans `<link>` tags with
//! tolerant regexes instead of building a DOM.

use std::sync::LazyLock;

use regex::Regex;

static LINK_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<link[^>]+>").expect("valid link tag regex"));

static REL_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\brel\s*=\s*["']([^"']+)["']"#).expect("valid rel regex"));

static HREF_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']+)["']"#).expect("valid href regex"));

/// The `href` of the first `<link>` whose `rel` mentions `icon`.
///
/// Attribute order and quote style don't matter. Tags with an icon `rel` but no
/// `href` are skipped.
pub fn find_icon_href(html: &str) -> Option<&str> {
    LINK_TAG.find_iter(html).find_map(|tag| {
        let tag = tag.as_str();
        let rel = REL_ATTR.captures(tag)?.get(1)?.as_str();
        if !rel.to_ascii_lowercase().contains("icon") {
            return None;
        }
        let href = HREF_ATTR.captures(tag)?.get(1)?.as_str().trim();
        (!href.is_empty()).then_some(href)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_shortcut_icon() {
        let html = r#"<html><head><link rel="shortcut icon" href="/favicon.png"></head></html>"#;
        assert_eq!(find_icon_href(html), Some("/favicon.png"));
    }

    #[test]
    fn test_attribute_order_and_quotes() {
        let html = "<head><LINK HREF='/static/icon.svg' type='image/svg+xml' REL='Icon'></head>";
        assert_eq!(find_icon_href(html), Some("/static/icon.svg"));
    }

    #[test]
    fn test_first_icon_wins() {
        let html = r#"
            <link rel="stylesheet" href="/site.css">
            <link rel="apple-touch-icon" href="/apple.png">
            <link rel="icon" href="/icon.png">
        "#;
        assert_eq!(find_icon_href(html), Some("/apple.png"));
    }

    #[test]
    fn test_skips_icon_without_href() {
        let html = r#"<link rel="icon"><link rel="icon" href="https://cdn.example.com/i.ico">"#;
        assert_eq!(find_icon_href(html), Some("https://cdn.example.com/i.ico"));
    }

    #[test]
    fn test_no_icon_links() {
        let html = r#"<link rel="stylesheet" href="/a.css"><a href="/icon.png">icon</a>"#;
        assert_eq!(find_icon_href(html), None);
        assert_eq!(find_icon_href(""), None);
    }

    #[test]
    fn test_multiline_tag() {
        let html = "<link\n  rel=\"icon\"\n  href=\"/multi.ico\"\n/>";
        assert_eq!(find_icon_href(html), Some("/multi.ico"));
    }
}
