//! Request input parsing into a validated site origin.
//!
//! A caller names a site either with `url` (an absolute URL) or `domain` (a bare
//! hostname, scheme defaulted to `https`). Both are reduced to the site's origin,
//! which is the only thing keys and outbound requests are derived from.

use url::Url;

use super::hostname::is_safe_hostname;

/// Why request input could not become a [`SiteOrigin`].
///
/// The `Display` text is the plain-text body returned to HTTP callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SiteError {
    #[error("Missing url")]
    Missing,

    #[error("Invalid url")]
    InvalidUrl(String),

    #[error("Invalid protocol")]
    UnsupportedScheme(String),

    #[error("Invalid hostname")]
    UnsafeHostname(String),
}

/// A validated `scheme://host[:port]` that is safe to fetch from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteOrigin {
    site: Url,
    origin: String,
    origin_url: Url,
    favicon_url: Url,
}

impl SiteOrigin {
    /// Build an origin from the `url` / `domain` request parameters.
    ///
    /// An empty `url` counts as absent and falls through to `domain`.
    pub fn from_params(url: Option<&str>, domain: Option<&str>) -> Result<Self, SiteError> {
        let raw = match (url.filter(|u| !u.is_empty()), domain.filter(|d| !d.is_empty())) {
            (Some(url), _) => url.to_string(),
            (None, Some(domain)) => format!("https://{domain}"),
            (None, None) => return Err(SiteError::Missing),
        };
        Self::parse(&raw)
    }

    /// Parse and validate an absolute site URL.
    pub fn parse(raw: &str) -> Result<Self, SiteError> {
        let site = Url::parse(raw).map_err(|e| SiteError::InvalidUrl(e.to_string()))?;

        match site.scheme() {
            "http" | "https" => {}
            scheme => return Err(SiteError::UnsupportedScheme(scheme.to_string())),
        }

        let Some(host) = site.host_str() else {
            return Err(SiteError::InvalidUrl(format!("{raw}: no host")));
        };
        if !is_safe_hostname(host) {
            return Err(SiteError::UnsafeHostname(host.to_string()));
        }

        let origin = site.origin().ascii_serialization();
        let origin_url = Url::parse(&origin).map_err(|e| SiteError::InvalidUrl(e.to_string()))?;
        let favicon_url = origin_url
            .join("/favicon.ico")
            .map_err(|e| SiteError::InvalidUrl(e.to_string()))?;

        Ok(Self { site, origin, origin_url, favicon_url })
    }

    /// Serialized origin, e.g. `https://example.com` (no trailing slash).
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn hostname(&self) -> &str {
        self.origin_url.host_str().unwrap_or_default()
    }

    /// The origin root as a URL (`https://example.com/`).
    pub fn url(&self) -> &Url {
        &self.origin_url
    }

    /// The full URL the caller supplied, after parsing.
    pub fn site(&self) -> &Url {
        &self.site
    }

    /// The conventional `/favicon.ico` location for this origin.
    pub fn favicon_url(&self) -> &Url {
        &self.favicon_url
    }
}
