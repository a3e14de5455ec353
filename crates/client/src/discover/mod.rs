//! Icon discovery for a single origin.
//!
//! 1. Probe `{origin}/favicon.ico`; a usable answer ends discovery without
//!    touching the root page.
//! 2. Otherwise fetch the root page and take the first `<link rel=*icon*>`.
//! 3. Anything unexpected falls back to the conventional `/favicon.ico` path.
//!
//! Discovery never fails: it always yields a candidate URL, which the image
//! validator then accepts or rejects.

pub mod links;

use std::time::Duration;

use url::Url;

use crate::fetch::{FetchError, Fetcher, SiteOrigin, is_safe_hostname, looks_like_challenge};

pub use links::find_icon_href;

/// Per-hop timeouts for discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryTimeouts {
    /// `/favicon.ico` probe (default: 8s)
    pub probe: Duration,
    /// Root HTML page (default: 9s)
    pub page: Duration,
}

impl Default for DiscoveryTimeouts {
    fn default() -> Self {
        Self { probe: Duration::from_millis(8000), page: Duration::from_millis(9000) }
    }
}

/// Find the best candidate icon URL for `site`.
pub async fn discover_favicon_url(fetcher: &dyn Fetcher, site: &SiteOrigin, timeouts: &DiscoveryTimeouts) -> Url {
    let conventional = site.favicon_url().clone();

    match fetcher.fetch(&conventional, timeouts.probe).await {
        Ok(probe) if probe.is_success() && !looks_like_challenge(&probe) => return conventional,
        Ok(probe) => {
            tracing::debug!(origin = site.origin(), status = probe.status.as_u16(), "favicon.ico probe unusable, reading root page");
        }
        // The host answered; only the body was over the cap.
        Err(FetchError::TooLarge { limit }) => {
            tracing::debug!(origin = site.origin(), limit, "favicon.ico probe body too large, reading root page");
        }
        Err(e) => {
            tracing::debug!(origin = site.origin(), error = %e, "favicon.ico probe failed");
            return conventional;
        }
    }

    let page = match fetcher.fetch(site.url(), timeouts.page).await {
        Ok(page) if page.is_success() && !looks_like_challenge(&page) => page,
        Ok(page) => {
            tracing::debug!(origin = site.origin(), status = page.status.as_u16(), "root page unusable");
            return conventional;
        }
        Err(e) => {
            tracing::debug!(origin = site.origin(), error = %e, "root page fetch failed");
            return conventional;
        }
    };

    let html = String::from_utf8_lossy(&page.body);
    let Some(href) = find_icon_href(&html) else {
        return conventional;
    };

    match site.url().join(href) {
        Ok(icon) if is_fetchable(&icon) => icon,
        Ok(icon) => {
            tracing::debug!(origin = site.origin(), %icon, "ignoring unsafe icon link");
            conventional
        }
        Err(_) => conventional,
    }
}

/// Page-supplied links get the same scheme and hostname gate as caller input.
fn is_fetchable(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(is_safe_hostname)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedFetcher, challenge, html, image, network_error, status, too_large};

    fn site() -> SiteOrigin {
        SiteOrigin::parse("https://example.com/some/page").unwrap()
    }

    #[tokio::test]
    async fn test_favicon_ico_short_circuits() {
        let fetcher = ScriptedFetcher::new()
            .route("https://example.com/favicon.ico", image("image/x-icon", b"ico"))
            .route("https://example.com/", html(r#"<link rel="icon" href="/other.png">"#));

        let url = discover_favicon_url(&fetcher, &site(), &DiscoveryTimeouts::default()).await;

        assert_eq!(url.as_str(), "https://example.com/favicon.ico");
        assert_eq!(fetcher.calls("https://example.com/"), 0);
    }

    #[tokio::test]
    async fn test_link_discovery_after_404() {
        let fetcher = ScriptedFetcher::new()
            .route("https://example.com/favicon.ico", status(404))
            .route("https://example.com/", html(r#"<head><link rel="icon" href="/static/icon.png"></head>"#));

        let url = discover_favicon_url(&fetcher, &site(), &DiscoveryTimeouts::default()).await;

        assert_eq!(url.as_str(), "https://example.com/static/icon.png");
        assert_eq!(fetcher.calls("https://example.com/"), 1);
    }

    #[tokio::test]
    async fn test_absolute_cdn_href() {
        let fetcher = ScriptedFetcher::new()
            .route("https://example.com/favicon.ico", status(404))
            .route("https://example.com/", html(r#"<link href="https://cdn.example.net/i.svg" rel="icon">"#));

        let url = discover_favicon_url(&fetcher, &site(), &DiscoveryTimeouts::default()).await;
        assert_eq!(url.as_str(), "https://cdn.example.net/i.svg");
    }

    #[tokio::test]
    async fn test_network_failure_returns_conventional_without_page() {
        let fetcher = ScriptedFetcher::new()
            .route("https://example.com/favicon.ico", network_error())
            .route("https://example.com/", html(r#"<link rel="icon" href="/x.png">"#));

        let url = discover_favicon_url(&fetcher, &site(), &DiscoveryTimeouts::default()).await;

        assert_eq!(url.as_str(), "https://example.com/favicon.ico");
        assert_eq!(fetcher.calls("https://example.com/"), 0);
    }

    #[tokio::test]
    async fn test_oversized_probe_still_reads_root_page() {
        let fetcher = ScriptedFetcher::new()
            .route("https://example.com/favicon.ico", too_large())
            .route("https://example.com/", html(r#"<link rel="icon" href="/x.png">"#));

        let url = discover_favicon_url(&fetcher, &site(), &DiscoveryTimeouts::default()).await;

        assert_eq!(url.as_str(), "https://example.com/x.png");
        assert_eq!(fetcher.calls("https://example.com/"), 1);
    }

    #[tokio::test]
    async fn test_challenge_everywhere_returns_conventional() {
        let fetcher = ScriptedFetcher::new()
            .route("https://example.com/favicon.ico", challenge())
            .route("https://example.com/", challenge());

        let url = discover_favicon_url(&fetcher, &site(), &DiscoveryTimeouts::default()).await;

        assert_eq!(url.as_str(), "https://example.com/favicon.ico");
        assert_eq!(fetcher.calls("https://example.com/"), 1);
    }

    #[tokio::test]
    async fn test_page_without_icon_link() {
        let fetcher = ScriptedFetcher::new()
            .route("https://example.com/favicon.ico", status(404))
            .route("https://example.com/", html("<html><head><title>hi</title></head></html>"));

        let url = discover_favicon_url(&fetcher, &site(), &DiscoveryTimeouts::default()).await;
        assert_eq!(url.as_str(), "https://example.com/favicon.ico");
    }

    #[tokio::test]
    async fn test_unsafe_icon_link_ignored() {
        let fetcher = ScriptedFetcher::new()
            .route("https://example.com/favicon.ico", status(404))
            .route("https://example.com/", html(r#"<link rel="icon" href="http://127.0.0.1/admin.png">"#));

        let url = discover_favicon_url(&fetcher, &site(), &DiscoveryTimeouts::default()).await;
        assert_eq!(url.as_str(), "https://example.com/favicon.ico");
    }

    #[tokio::test]
    async fn test_timeouts_are_passed_through() {
        let fetcher = ScriptedFetcher::new()
            .route("https://example.com/favicon.ico", status(404))
            .route("https://example.com/", status(500));
        let timeouts = DiscoveryTimeouts { probe: Duration::from_millis(1234), page: Duration::from_millis(5678) };

        discover_favicon_url(&fetcher, &site(), &timeouts).await;

        assert_eq!(fetcher.last_timeout("https://example.com/favicon.ico"), Some(Duration::from_millis(1234)));
        assert_eq!(fetcher.last_timeout("https://example.com/"), Some(Duration::from_millis(5678)));
    }
}
