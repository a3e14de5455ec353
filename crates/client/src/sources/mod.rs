//! Source fallback orchestration.
//!
//! Tries each icon source in the configured order, accepts the first response
//! the image validator is happy with, and otherwise synthesizes a default icon.
//! The chain always produces an image.

pub mod fallback;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use icoproxy_core::{AppConfig, SourceOrder};

use crate::discover::{DiscoveryTimeouts, discover_favicon_url};
use crate::fetch::{Fetcher, IconResponse, SiteOrigin};
use crate::image::{MAX_ICON_BYTES, try_fetch_image};

pub use fallback::{default_icon, default_icon_svg};

/// Where a candidate icon URL comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconSource {
    /// The site's own `/favicon.ico` or `<link rel=icon>`.
    Discovery,
    DuckDuckGo,
    Google,
}

impl IconSource {
    pub fn name(self) -> &'static str {
        match self {
            IconSource::Discovery => "discovery",
            IconSource::DuckDuckGo => "duckduckgo",
            IconSource::Google => "google",
        }
    }
}

/// Source sequence for an ordering policy.
pub fn source_sequence(order: SourceOrder) -> [IconSource; 3] {
    match order {
        SourceOrder::DiscoveryFirst => [IconSource::Discovery, IconSource::DuckDuckGo, IconSource::Google],
        SourceOrder::ServicesFirst => [IconSource::DuckDuckGo, IconSource::Google, IconSource::Discovery],
    }
}

/// Outcome of orchestration.
#[derive(Debug, Clone)]
pub struct IconFetchResult {
    pub response: IconResponse,
    /// The candidate URL that produced `response`; `None` for the synthesized default.
    pub resolved_source_url: Option<Url>,
}

/// Ordering, timeouts and limits for one resolution.
#[derive(Debug, Clone)]
pub struct ResolvePolicy {
    pub order: SourceOrder,
    pub discovery: DiscoveryTimeouts,
    /// Third-party service fetch (default: 8s discovery-first, 7s services-first)
    pub service_timeout: Duration,
    /// Discovered or remembered icon fetch (default: 9s)
    pub image_timeout: Duration,
    pub max_icon_bytes: usize,
}

impl ResolvePolicy {
    /// Default timeouts for an ordering policy.
    pub fn for_order(order: SourceOrder) -> Self {
        let service_timeout = match order {
            SourceOrder::DiscoveryFirst => Duration::from_millis(8000),
            SourceOrder::ServicesFirst => Duration::from_millis(7000),
        };
        Self {
            order,
            discovery: DiscoveryTimeouts::default(),
            service_timeout,
            image_timeout: Duration::from_millis(9000),
            max_icon_bytes: MAX_ICON_BYTES,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            order: config.source_order,
            discovery: DiscoveryTimeouts { probe: config.probe_timeout(), page: config.page_timeout() },
            service_timeout: config.service_timeout(),
            image_timeout: config.image_timeout(),
            max_icon_bytes: config.max_icon_bytes,
        }
    }
}

impl Default for ResolvePolicy {
    fn default() -> Self {
        Self::for_order(SourceOrder::default())
    }
}

/// Runs the source chain against a shared [`Fetcher`].
#[derive(Clone)]
pub struct Orchestrator {
    fetcher: Arc<dyn Fetcher>,
    policy: ResolvePolicy,
}

impl Orchestrator {
    pub fn new(fetcher: Arc<dyn Fetcher>, policy: ResolvePolicy) -> Self {
        Self { fetcher, policy }
    }

    pub fn policy(&self) -> &ResolvePolicy {
        &self.policy
    }

    /// Validate a known icon URL (e.g. one remembered in the metadata store).
    pub async fn revalidate(&self, url: &Url) -> Option<IconResponse> {
        try_fetch_image(self.fetcher.as_ref(), url, self.policy.image_timeout, self.policy.max_icon_bytes).await
    }

    /// Resolve an icon for `site`, falling back to the synthesized default.
    pub async fn fetch_favicon(&self, site: &SiteOrigin) -> IconFetchResult {
        for source in source_sequence(self.policy.order) {
            let Some((candidate, timeout)) = self.candidate(source, site).await else {
                continue;
            };

            if let Some(response) = try_fetch_image(self.fetcher.as_ref(), &candidate, timeout, self.policy.max_icon_bytes).await {
                tracing::info!(origin = site.origin(), source = source.name(), url = %candidate, "icon resolved");
                return IconFetchResult { response, resolved_source_url: Some(candidate) };
            }
            tracing::debug!(origin = site.origin(), source = source.name(), url = %candidate, "source failed");
        }

        tracing::info!(origin = site.origin(), "no source produced an icon, using default");
        IconFetchResult { response: default_icon(site.hostname()), resolved_source_url: None }
    }

    async fn candidate(&self, source: IconSource, site: &SiteOrigin) -> Option<(Url, Duration)> {
        match source {
            IconSource::Discovery => {
                let url = discover_favicon_url(self.fetcher.as_ref(), site, &self.policy.discovery).await;
                Some((url, self.policy.image_timeout))
            }
            IconSource::DuckDuckGo => services::duckduckgo_url(site.hostname()).map(|u| (u, self.policy.service_timeout)),
            IconSource::Google => services::google_url(site.hostname()).map(|u| (u, self.policy.service_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedFetcher, challenge, html, image, network_error, respond, status};

    const DDG: &str = "https://icons.duckduckgo.com/ip3/example.com.ico";
    const GOOGLE: &str = "https://www.google.com/s2/favicons?domain=example.com&sz=64";
    const PROBE: &str = "https://example.com/favicon.ico";
    const ROOT: &str = "https://example.com/";

    fn site() -> SiteOrigin {
        SiteOrigin::parse("https://example.com").unwrap()
    }

    fn orchestrator(fetcher: &Arc<ScriptedFetcher>, order: SourceOrder) -> Orchestrator {
        Orchestrator::new(fetcher.clone(), ResolvePolicy::for_order(order))
    }

    #[test]
    fn test_source_sequences() {
        assert_eq!(
            source_sequence(SourceOrder::DiscoveryFirst),
            [IconSource::Discovery, IconSource::DuckDuckGo, IconSource::Google]
        );
        assert_eq!(
            source_sequence(SourceOrder::ServicesFirst),
            [IconSource::DuckDuckGo, IconSource::Google, IconSource::Discovery]
        );
    }

    #[test]
    fn test_policy_defaults_per_order() {
        assert_eq!(ResolvePolicy::for_order(SourceOrder::DiscoveryFirst).service_timeout, Duration::from_millis(8000));
        assert_eq!(ResolvePolicy::for_order(SourceOrder::ServicesFirst).service_timeout, Duration::from_millis(7000));
        assert_eq!(ResolvePolicy::default().image_timeout, Duration::from_millis(9000));
    }

    #[test]
    fn test_policy_from_config() {
        let config = AppConfig { source_order: SourceOrder::ServicesFirst, service_timeout_ms: 7000, max_icon_bytes: 1000, ..AppConfig::default() };
        let policy = ResolvePolicy::from_config(&config);
        assert_eq!(policy.order, SourceOrder::ServicesFirst);
        assert_eq!(policy.service_timeout, Duration::from_millis(7000));
        assert_eq!(policy.max_icon_bytes, 1000);
        assert_eq!(policy.discovery.probe, Duration::from_millis(config.probe_timeout_ms));
    }

    #[tokio::test]
    async fn test_discovery_first_uses_site_icon() {
        let fetcher = Arc::new(ScriptedFetcher::new().route(PROBE, image("image/x-icon", b"site-ico")).route(DDG, image("image/x-icon", b"ddg")));

        let result = orchestrator(&fetcher, SourceOrder::DiscoveryFirst).fetch_favicon(&site()).await;

        assert_eq!(&result.response.body[..], b"site-ico");
        assert_eq!(result.resolved_source_url.unwrap().as_str(), PROBE);
        assert_eq!(fetcher.calls(DDG), 0);
        assert_eq!(fetcher.calls(ROOT), 0);
    }

    #[tokio::test]
    async fn test_discovery_first_falls_to_duckduckgo() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .route(PROBE, challenge())
                .route(ROOT, challenge())
                .route(DDG, image("image/x-icon", b"ddg")),
        );

        let result = orchestrator(&fetcher, SourceOrder::DiscoveryFirst).fetch_favicon(&site()).await;

        assert_eq!(&result.response.body[..], b"ddg");
        assert_eq!(result.resolved_source_url.unwrap().as_str(), DDG);
        assert_eq!(fetcher.last_timeout(DDG), Some(Duration::from_millis(8000)));
        assert_eq!(fetcher.calls(GOOGLE), 0);
    }

    #[tokio::test]
    async fn test_services_first_order() {
        let fetcher = Arc::new(ScriptedFetcher::new().route(DDG, status(404)).route(GOOGLE, image("image/png", b"google")));

        let result = orchestrator(&fetcher, SourceOrder::ServicesFirst).fetch_favicon(&site()).await;

        assert_eq!(&result.response.body[..], b"google");
        assert_eq!(result.resolved_source_url.unwrap().as_str(), GOOGLE);
        assert_eq!(fetcher.last_timeout(GOOGLE), Some(Duration::from_millis(7000)));
        assert_eq!(fetcher.calls(PROBE), 0);
    }

    #[tokio::test]
    async fn test_services_first_ends_with_discovery() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .route(DDG, network_error())
                .route(GOOGLE, html("<html>not an image</html>"))
                .route(PROBE, status(404))
                .route(ROOT, html(r#"<link rel="icon" href="/static/icon.png">"#))
                .route("https://example.com/static/icon.png", image("image/png", b"png")),
        );

        let result = orchestrator(&fetcher, SourceOrder::ServicesFirst).fetch_favicon(&site()).await;

        assert_eq!(&result.response.body[..], b"png");
        assert_eq!(result.resolved_source_url.unwrap().as_str(), "https://example.com/static/icon.png");
        assert_eq!(fetcher.last_timeout("https://example.com/static/icon.png"), Some(Duration::from_millis(9000)));
    }

    #[tokio::test]
    async fn test_everything_fails_gives_default() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .route(PROBE, challenge())
                .route(ROOT, challenge())
                .route(DDG, status(404))
                .route(GOOGLE, network_error()),
        );

        let result = orchestrator(&fetcher, SourceOrder::DiscoveryFirst).fetch_favicon(&site()).await;

        assert!(result.resolved_source_url.is_none());
        assert_eq!(result.response.content_type(), Some("image/svg+xml; charset=UTF-8"));
        assert!(String::from_utf8_lossy(&result.response.body).contains(">E</text>"));
        assert_eq!(fetcher.calls(GOOGLE), 1);
    }

    #[tokio::test]
    async fn test_oversized_candidates_skipped() {
        let big = respond(200, &[("content-type", "image/png"), ("content-length", "900000")], b"png");
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .route(PROBE, big.clone())
                .route(DDG, big)
                .route(GOOGLE, image("image/png", b"small")),
        );

        let result = orchestrator(&fetcher, SourceOrder::DiscoveryFirst).fetch_favicon(&site()).await;
        assert_eq!(&result.response.body[..], b"small");
    }

    #[tokio::test]
    async fn test_revalidate() {
        let fetcher = Arc::new(ScriptedFetcher::new().route("https://cdn.example.com/i.png", image("image/png", b"i")));
        let orchestrator = orchestrator(&fetcher, SourceOrder::DiscoveryFirst);

        assert!(orchestrator.revalidate(&Url::parse("https://cdn.example.com/i.png").unwrap()).await.is_some());
        assert!(orchestrator.revalidate(&Url::parse("https://cdn.example.com/gone.png").unwrap()).await.is_none());
    }
}
