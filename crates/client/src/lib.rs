//! Client code for icoproxy.
//!
//! This crate provides the outbound half of icon resolution: hostname safety,
//! bounded fetching, discovery on the site itself, image validation and the
//! source fallback chain used by the server.

pub mod discover;
pub mod fetch;
pub mod image;
pub mod sources;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use discover::{DiscoveryTimeouts, discover_favicon_url};
pub use fetch::{
    FetchClient, FetchConfig, FetchError, Fetcher, IconResponse, SiteError, SiteOrigin, is_safe_hostname,
    looks_like_challenge,
};
pub use image::try_fetch_image;
pub use sources::{IconFetchResult, IconSource, Orchestrator, ResolvePolicy, default_icon};
