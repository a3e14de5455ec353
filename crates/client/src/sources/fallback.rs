//! The synthesized default icon.

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::fetch::IconResponse;

pub const DEFAULT_ICON_CONTENT_TYPE: &str = "image/svg+xml; charset=UTF-8";

/// A rounded blue square carrying the first letter of `hostname`.
pub fn default_icon_svg(hostname: &str) -> String {
    let letter = hostname
        .trim()
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect::<String>())
        .unwrap_or_else(|| "•".to_string());

    format!(
        r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="64" height="64" viewBox="0 0 64 64">
  <rect x="4" y="4" width="56" height="56" rx="14" fill="#3b82f6"/>
  <text x="32" y="40" text-anchor="middle" font-family="system-ui, -apple-system, Segoe UI, Roboto" font-size="28" font-weight="800" fill="#ffffff">{}</text>
</svg>"##,
        escape_xml(&letter)
    )
}

/// Always-available 200 response wrapping [`default_icon_svg`].
pub fn default_icon(hostname: &str) -> IconResponse {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(DEFAULT_ICON_CONTENT_TYPE));
    IconResponse { final_url: None, status: StatusCode::OK, headers, body: Bytes::from(default_icon_svg(hostname)) }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
