//! Persistent state behind the favicon resolver.
//!
//! Two logically separate layers share the same origin-scoped addressing:
//!
//! - the **metadata store** remembers *which URL* last produced a usable icon
//!   for an origin (`meta:{origin}` → [`FaviconMeta`]);
//! - the **edge response cache** keeps the final normalized response
//!   byte-for-byte under a synthetic request URL ([`keys::cache_key`]).
//!
//! Both are reached through traits so the request handler can be given a
//! SQLite database in production and an in-memory map in tests. Entries carry
//! their own expiry; reads never return expired rows.

pub mod connection;
pub mod hash;
pub mod keys;
pub mod memory;
pub mod meta;
pub mod migrations;
pub mod responses;

use std::time::Duration;

use async_trait::async_trait;

pub use crate::Error;

pub use connection::SqliteStore;
pub use memory::MemoryStore;
pub use meta::FaviconMeta;
pub use responses::CachedResponse;

/// Key → [`FaviconMeta`] mapping with expiry.
#[async_trait]
pub trait MetaStore: Send + Sync {
    /// Look up the remembered icon URL. Undecodable records read as `None`.
    async fn get_meta(&self, key: &str) -> Result<Option<FaviconMeta>, Error>;

    /// Replace the record for `key`; it expires after `ttl`.
    async fn put_meta(&self, key: &str, meta: &FaviconMeta, ttl: Duration) -> Result<(), Error>;

    async fn delete_meta(&self, key: &str) -> Result<(), Error>;

    /// Drop expired records, returning how many were removed.
    async fn purge_expired_meta(&self) -> Result<u64, Error>;
}

/// Origin-keyed cache of normalized responses.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get_response(&self, key: &str) -> Result<Option<CachedResponse>, Error>;

    /// Store `response` under `key`, replacing any previous entry; it expires after `ttl`.
    async fn put_response(&self, key: &str, response: &CachedResponse, ttl: Duration) -> Result<(), Error>;

    async fn delete_response(&self, key: &str) -> Result<(), Error>;

    /// Drop expired responses, returning how many were removed.
    async fn purge_expired_responses(&self) -> Result<u64, Error>;
}

/// Absolute expiry in epoch milliseconds for an entry written now.
pub(crate) fn expires_at_ms(ttl: Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_ms().saturating_add(ttl_ms)
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
