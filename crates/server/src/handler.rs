//! Favicon resolution and invalidation.
//!
//! This module owns the request-side flow: edge cache, then the metadata
//! store, then the source chain. Store writes happen in the background and
//! store failures never fail a request.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio_util::task::TaskTracker;
use url::Url;

use icoproxy_client::{IconResponse, Orchestrator, SiteOrigin};
use icoproxy_core::store::hash::compute_etag;
use icoproxy_core::store::keys::{cache_key, meta_key};
use icoproxy_core::{AppConfig, CachedResponse, FaviconMeta, MetaStore, ResponseCache};

/// Upstream headers that don't survive normalization.
///
/// Transport headers describe the upstream connection, not the re-emitted
/// (decoded, buffered) body. Cookies must not be replayed to other callers.
const DROPPED_HEADERS: &[&str] =
    &["content-length", "transfer-encoding", "connection", "content-encoding", "keep-alive", "set-cookie"];

/// Headers the service always sets itself.
const OWNED_HEADERS: &[&str] = &["access-control-allow-origin", "cache-control", "etag"];

/// Caching directives applied to every served icon.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub cache_control: String,
    pub meta_ttl: Duration,
    pub cache_ttl: Duration,
}

impl CachePolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self { cache_control: config.cache_control.clone(), meta_ttl: config.meta_ttl(), cache_ttl: config.cache_ttl() }
    }
}

/// Resolves icons for origins against the two stores and the source chain.
pub struct FaviconService {
    meta: Arc<dyn MetaStore>,
    cache: Arc<dyn ResponseCache>,
    orchestrator: Orchestrator,
    policy: CachePolicy,
    background: TaskTracker,
}

impl FaviconService {
    pub fn new(meta: Arc<dyn MetaStore>, cache: Arc<dyn ResponseCache>, orchestrator: Orchestrator, policy: CachePolicy) -> Self {
        Self { meta, cache, orchestrator, policy, background: TaskTracker::new() }
    }

    /// Produce the icon response for `site`. Always succeeds.
    pub async fn resolve(&self, site: &SiteOrigin) -> CachedResponse {
        let edge_key = cache_key(site.origin());

        match self.cache.get_response(&edge_key).await {
            Ok(Some(hit)) => {
                tracing::debug!(origin = site.origin(), "edge cache hit");
                return self.with_common_headers(hit);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(origin = site.origin(), error = %e, "edge cache lookup failed"),
        }

        let meta_key = meta_key(site.origin());
        if let Some(response) = self.revalidate_remembered(&meta_key, site).await {
            let normalized = self.normalize(response);
            self.spawn_cache_put(edge_key, normalized.clone());
            return normalized;
        }

        let result = self.orchestrator.fetch_favicon(site).await;
        if let Some(source) = result.resolved_source_url {
            self.spawn_meta_put(meta_key, FaviconMeta::new(source.as_str()));
        }

        let normalized = self.normalize(result.response);
        self.spawn_cache_put(edge_key, normalized.clone());
        normalized
    }

    /// Forget everything known about `site`. Both deletes are attempted.
    pub async fn refresh(&self, site: &SiteOrigin) -> Result<(), icoproxy_core::Error> {
        let meta = self.meta.delete_meta(&meta_key(site.origin())).await;
        let cache = self.cache.delete_response(&cache_key(site.origin())).await;
        tracing::info!(origin = site.origin(), "cache entries invalidated");
        meta.and(cache)
    }

    /// Wait for in-flight background writes, then accept new ones again.
    #[cfg(test)]
    pub async fn flush_background(&self) {
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }

    /// Stop accepting background writes and wait for pending ones.
    pub async fn shutdown(&self) {
        self.background.close();
        tracing::info!(pending = self.background.len(), "draining background writes");
        self.background.wait().await;
    }

    async fn revalidate_remembered(&self, key: &str, site: &SiteOrigin) -> Option<IconResponse> {
        let meta = match self.meta.get_meta(key).await {
            Ok(meta) => meta?,
            Err(e) => {
                tracing::warn!(origin = site.origin(), error = %e, "metadata lookup failed");
                return None;
            }
        };

        let url = Url::parse(&meta.icon_url).ok()?;
        let response = self.orchestrator.revalidate(&url).await;
        match &response {
            Some(_) => tracing::info!(origin = site.origin(), %url, "remembered icon still valid"),
            None => tracing::debug!(origin = site.origin(), %url, "remembered icon no longer valid"),
        }
        response
    }

    /// Turn an upstream response into the form that is served and cached.
    pub fn normalize(&self, response: IconResponse) -> CachedResponse {
        let mut headers: Vec<(String, String)> = response
            .headers
            .iter()
            .filter(|(name, _)| !DROPPED_HEADERS.contains(&name.as_str()))
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();
        headers.retain(|(name, _)| !OWNED_HEADERS.contains(&name.as_str()));
        headers.push(("etag".to_string(), compute_etag(&response.body)));

        self.with_common_headers(CachedResponse { status: response.status.as_u16(), headers, body: response.body })
    }

    fn with_common_headers(&self, mut response: CachedResponse) -> CachedResponse {
        response.headers.retain(|(name, _)| {
            !name.eq_ignore_ascii_case("access-control-allow-origin") && !name.eq_ignore_ascii_case("cache-control")
        });
        response.headers.push(("access-control-allow-origin".to_string(), "*".to_string()));
        response.headers.push(("cache-control".to_string(), self.policy.cache_control.clone()));
        response
    }

    fn spawn_meta_put(&self, key: String, meta: FaviconMeta) {
        let store = Arc::clone(&self.meta);
        let ttl = self.policy.meta_ttl;
        self.background.spawn(async move {
            if let Err(e) = store.put_meta(&key, &meta, ttl).await {
                tracing::warn!(key = %key, error = %e, "failed to persist favicon metadata");
            }
        });
    }

    fn spawn_cache_put(&self, key: String, response: CachedResponse) {
        let cache = Arc::clone(&self.cache);
        let ttl = self.policy.cache_ttl;
        self.background.spawn(async move {
            if let Err(e) = cache.put_response(&key, &response, ttl).await {
                tracing::warn!(key = %key, error = %e, "failed to populate edge cache");
            }
        });
    }
}

/// Render a cached response as an HTTP response.
///
/// Header pairs that are not valid HTTP are skipped.
pub fn into_http(cached: CachedResponse) -> Response {
    let status = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::OK);
    let mut response = (status, Body::from(cached.body)).into_response();
    let headers = response.headers_mut();
    for (name, value) in &cached.headers {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            headers.append(name, value);
        }
    }
    response
}
