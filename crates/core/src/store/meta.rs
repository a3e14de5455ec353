//! Favicon metadata records.
//!
//! A record remembers the last icon URL that resolved for an origin so a later
//! request can re-fetch it directly instead of re-running discovery. The URL is
//! a hint: callers re-validate it before trusting it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::SqliteStore;
use super::{MetaStore, expires_at_ms, now_ms};
use crate::Error;

/// Last icon URL that resolved for an origin.
///
/// Serialized as `{"iconUrl": string, "updatedAt": number}` with `updatedAt`
/// in Unix epoch milliseconds. Always written as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaviconMeta {
    pub icon_url: String,
    pub updated_at: i64,
}

impl FaviconMeta {
    /// A record for `icon_url` stamped with the current time.
    pub fn new(icon_url: impl Into<String>) -> Self {
        Self { icon_url: icon_url.into(), updated_at: now_ms() }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a stored record. Anything that is not exactly the expected
    /// shape (missing field, wrong type, not JSON) is `None`.
    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

#[async_trait]
impl MetaStore for SqliteStore {
    async fn get_meta(&self, key: &str) -> Result<Option<FaviconMeta>, Error> {
        let key = key.to_string();
        let now = now_ms();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let mut stmt = conn.prepare("SELECT value_json FROM favicon_meta WHERE key = ?1 AND expires_at > ?2")?;

                match stmt.query_row(params![key, now], |row| row.get(0)) {
                    Ok(json) => Ok(Some(json)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        Ok(raw.as_deref().and_then(FaviconMeta::from_json))
    }

    async fn put_meta(&self, key: &str, meta: &FaviconMeta, ttl: Duration) -> Result<(), Error> {
        let key = key.to_string();
        let value_json = meta.to_json()?;
        let expires_at = expires_at_ms(ttl);

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO favicon_meta (key, value_json, expires_at)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                        value_json = excluded.value_json,
                        expires_at = excluded.expires_at",
                    params![key, value_json, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_meta(&self, key: &str) -> Result<(), Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM favicon_meta WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn purge_expired_meta(&self) -> Result<u64, Error> {
        let now = now_ms();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM favicon_meta WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
