//! Origin-scoped store keys.
//!
//! Every path and query variation on a site collapses into one entry per origin.

/// Base of the synthetic request URL the edge cache is addressed by.
pub const CACHE_KEY_BASE: &str = "https://icoproxy.invalid/cache";

/// Metadata store key for an origin: `meta:{origin}`.
pub fn meta_key(origin: &str) -> String {
    format!("meta:{origin}")
}

/// Edge cache key for an origin: the synthetic URL with the origin as its
/// percent-encoded `origin` query parameter.
pub fn cache_key(origin: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(origin.as_bytes()).collect();
    format!("{CACHE_KEY_BASE}?origin={encoded}")
}
