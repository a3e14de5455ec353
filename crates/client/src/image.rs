//! Candidate icon validation.

use std::time::Duration;

use url::Url;

use crate::fetch::{Fetcher, IconResponse};

/// Default size cap for an accepted icon.
pub const MAX_ICON_BYTES: usize = 500_000;

/// Fetch `url` and keep the response only if it plausibly is a small image.
///
/// Accepts a 2xx answer whose content type starts with `image/` or mentions
/// `svg`, whose declared `content-length` (when numeric) and actual body are both
/// within `max_bytes`. Every failure, network errors included, is `None`.
pub async fn try_fetch_image(fetcher: &dyn Fetcher, url: &Url, timeout: Duration, max_bytes: usize) -> Option<IconResponse> {
    let response = match fetcher.fetch(url, timeout).await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(%url, error = %e, "icon fetch failed");
            return None;
        }
    };

    match rejection(&response, max_bytes) {
        None => Some(response),
        Some(reason) => {
            tracing::debug!(%url, status = response.status.as_u16(), reason, "icon rejected");
            None
        }
    }
}

fn rejection(response: &IconResponse, max_bytes: usize) -> Option<&'static str> {
    if !response.is_success() {
        return Some("status");
    }
    if !is_image_type(response.content_type().unwrap_or_default()) {
        return Some("content-type");
    }
    if response.content_length().is_some_and(|len| len > max_bytes as u64) {
        return Some("declared length");
    }
    if response.body.len() > max_bytes {
        return Some("body length");
    }
    None
}

fn is_image_type(content_type: &str) -> bool {
    let content_type = content_type.trim().to_ascii_lowercase();
    content_type.starts_with("image/") || content_type.contains("svg")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedFetcher, html, image, network_error, respond, status, timeout};

    const URL: &str = "https://example.com/favicon.ico";
    const T: Duration = Duration::from_millis(9000);

    async fn check(fetcher: &ScriptedFetcher) -> Option<IconResponse> {
        try_fetch_image(fetcher, &Url::parse(URL).unwrap(), T, MAX_ICON_BYTES).await
    }

    #[tokio::test]
    async fn test_accepts_small_image() {
        let fetcher = ScriptedFetcher::new().route(URL, image("image/x-icon", b"\x00\x00\x01\x00"));
        let response = check(&fetcher).await.unwrap();
        assert_eq!(&response.body[..], b"\x00\x00\x01\x00");
        assert_eq!(fetcher.last_timeout(URL), Some(T));
    }

    #[tokio::test]
    async fn test_accepts_svg_variants() {
        let fetcher = ScriptedFetcher::new().route(URL, image("image/svg+xml", b"<svg/>"));
        assert!(check(&fetcher).await.is_some());

        let fetcher = ScriptedFetcher::new().route(URL, respond(200, &[("content-type", "application/svg")], b"<svg/>"));
        assert!(check(&fetcher).await.is_some());
    }

    #[tokio::test]
    async fn test_rejects_non_image() {
        let fetcher = ScriptedFetcher::new().route(URL, html("<html></html>"));
        assert!(check(&fetcher).await.is_none());

        let fetcher = ScriptedFetcher::new().route(URL, respond(200, &[], b"\x89PNG"));
        assert!(check(&fetcher).await.is_none());
    }

    #[tokio::test]
    async fn test_rejects_error_status() {
        let fetcher = ScriptedFetcher::new().route(URL, status(404));
        assert!(check(&fetcher).await.is_none());

        let fetcher = ScriptedFetcher::new().route(URL, respond(500, &[("content-type", "image/png")], b"png"));
        assert!(check(&fetcher).await.is_none());
    }

    #[tokio::test]
    async fn test_rejects_declared_oversize() {
        let fetcher = ScriptedFetcher::new().route(
            URL,
            respond(200, &[("content-type", "image/png"), ("content-length", "900000")], b"png"),
        );
        assert!(check(&fetcher).await.is_none());
    }

    #[tokio::test]
    async fn test_ignores_non_numeric_length() {
        let fetcher =
            ScriptedFetcher::new().route(URL, respond(200, &[("content-type", "image/png"), ("content-length", "huge")], b"png"));
        assert!(check(&fetcher).await.is_some());
    }

    #[tokio::test]
    async fn test_rejects_actual_oversize_body() {
        let body = vec![0u8; 600_000];
        let fetcher = ScriptedFetcher::new().route(URL, image("image/png", &body));
        assert!(check(&fetcher).await.is_none());
    }

    #[tokio::test]
    async fn test_limit_is_inclusive() {
        let fetcher = ScriptedFetcher::new().route(URL, image("image/png", b"1234"));
        assert!(try_fetch_image(&fetcher, &Url::parse(URL).unwrap(), T, 4).await.is_some());
        assert!(try_fetch_image(&fetcher, &Url::parse(URL).unwrap(), T, 3).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_errors_are_none() {
        let fetcher = ScriptedFetcher::new().route(URL, network_error());
        assert!(check(&fetcher).await.is_none());

        let fetcher = ScriptedFetcher::new().route(URL, timeout());
        assert!(check(&fetcher).await.is_none());
    }
}
