//! Bounded outbound HTTP for icon resolution.
//!
//! ### Request shape
//! - Fixed, honest User-Agent and a browser-like `Accept` header
//! - Redirects followed up to a limit; a hop to an unsafe hostname stops the chain
//!
//! ### Bounds
//! - The whole call (connect, headers, body) runs under one timeout; when it
//!   fires the request future is dropped, which aborts the connection.
//! - Buffered bodies are capped (default: 5MB).
//!
//! ### Safety
//! - [`hostname::is_safe_hostname`] gates every caller-supplied site before
//!   any network call.

pub mod error;
pub mod hostname;
pub mod site;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, StatusCode};
use url::Url;

use icoproxy_core::AppConfig;

pub use error::FetchError;
pub use hostname::is_safe_hostname;
pub use site::{SiteError, SiteOrigin};

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "Mozilla/5.0 (compatible; icoproxy/0.1)")
    pub user_agent: String,

    /// Maximum buffered body size in bytes (default: 5MB)
    pub max_body_bytes: usize,

    /// Maximum number of redirects to follow (default: 10)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; icoproxy/0.1)".to_string(),
            max_body_bytes: 5 * 1024 * 1024,
            max_redirects: 10,
        }
    }
}

impl FetchConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), max_redirects: config.max_redirects, ..Self::default() }
    }
}

/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct IconResponse {
    /// URL the body came from after redirects; `None` for synthesized responses.
    pub final_url: Option<Url>,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IconResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Header value as a string, if present and valid ASCII.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// Declared `content-length`, when it parses as a number.
    pub fn content_length(&self) -> Option<u64> {
        self.header_str(header::CONTENT_LENGTH.as_str())
            .and_then(|v| v.trim().parse().ok())
    }
}

/// Outbound HTTP seam.
///
/// Production code uses [`FetchClient`]; tests substitute a scripted fake.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url`, giving up after `timeout`.
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<IconResponse, FetchError>;
}

/// Whether a response is a bot-mitigation interstitial rather than content.
///
/// True for a 403 whose `cf-mitigated` header mentions `challenge`, or whose
/// `server` header mentions `cloudflare`.
pub fn looks_like_challenge(response: &IconResponse) -> bool {
    if response.status != StatusCode::FORBIDDEN {
        return false;
    }
    let mitigated = response
        .header_str("cf-mitigated")
        .is_some_and(|v| v.to_ascii_lowercase().contains("challenge"));
    let server = response
        .header_str(header::SERVER.as_str())
        .is_some_and(|v| v.to_ascii_lowercase().contains("cloudflare"));
    mitigated || server
}

/// HTTP fetch client with hard timeouts and a body cap.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let max_redirects = config.max_redirects;
        let redirects = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                attempt.error("too many redirects")
            } else if !attempt.url().host_str().is_some_and(is_safe_hostname) {
                attempt.stop()
            } else {
                attempt.follow()
            }
        });

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(redirects)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| FetchError::Build(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn fetch_unbounded(&self, url: &Url) -> Result<IconResponse, FetchError> {
        let mut response = self
            .http
            .get(url.clone())
            .header(header::ACCEPT, ACCEPT)
            .send()
            .await?;

        let limit = self.config.max_body_bytes;
        if let Some(len) = response.content_length()
            && len > limit as u64
        {
            return Err(FetchError::TooLarge { limit });
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(IconResponse { final_url: Some(final_url), status, headers, body: body.freeze() })
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<IconResponse, FetchError> {
        let start = Instant::now();
        let result = match tokio::time::timeout(timeout, self.fetch_unbounded(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        };

        let fetch_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(r) => tracing::debug!(%url, status = r.status.as_u16(), bytes = r.body.len(), fetch_ms, "fetched"),
            Err(e) => tracing::debug!(%url, error = %e, fetch_ms, "fetch failed"),
        }
        result
    }
}
