//! Process-local store backend.
//!
//! Uses HashMaps behind tokio RwLocks. Clones share the same maps.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CachedResponse, FaviconMeta, MetaStore, ResponseCache};
use crate::Error;

#[derive(Debug, Clone)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        let now = Instant::now();
        Self { value, expires_at: now.checked_add(ttl).unwrap_or(now + Duration::from_secs(u32::MAX as u64)) }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory metadata store and response cache.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    meta: Arc<RwLock<HashMap<String, Expiring<FaviconMeta>>>>,
    responses: Arc<RwLock<HashMap<String, Expiring<CachedResponse>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) metadata records.
    pub async fn meta_len(&self) -> usize {
        self.meta.read().await.values().filter(|e| !e.is_expired()).count()
    }

    /// Number of live (unexpired) cached responses.
    pub async fn response_len(&self) -> usize {
        self.responses.read().await.values().filter(|e| !e.is_expired()).count()
    }
}

#[async_trait]
impl MetaStore for MemoryStore {
    async fn get_meta(&self, key: &str) -> Result<Option<FaviconMeta>, Error> {
        let map = self.meta.read().await;
        Ok(map.get(key).filter(|e| !e.is_expired()).map(|e| e.value.clone()))
    }

    async fn put_meta(&self, key: &str, meta: &FaviconMeta, ttl: Duration) -> Result<(), Error> {
        self.meta
            .write()
            .await
            .insert(key.to_string(), Expiring::new(meta.clone(), ttl));
        Ok(())
    }

    async fn delete_meta(&self, key: &str) -> Result<(), Error> {
        self.meta.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired_meta(&self) -> Result<u64, Error> {
        let mut map = self.meta.write().await;
        let before = map.len();
        map.retain(|_, e| !e.is_expired());
        Ok((before - map.len()) as u64)
    }
}

#[async_trait]
impl ResponseCache for MemoryStore {
    async fn get_response(&self, key: &str) -> Result<Option<CachedResponse>, Error> {
        let map = self.responses.read().await;
        Ok(map.get(key).filter(|e| !e.is_expired()).map(|e| e.value.clone()))
    }

    async fn put_response(&self, key: &str, response: &CachedResponse, ttl: Duration) -> Result<(), Error> {
        self.responses
            .write()
            .await
            .insert(key.to_string(), Expiring::new(response.clone(), ttl));
        Ok(())
    }

    async fn delete_response(&self, key: &str) -> Result<(), Error> {
        self.responses.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired_responses(&self) -> Result<u64, Error> {
        let mut map = self.responses.write().await;
        let before = map.len();
        map.retain(|_, e| !e.is_expired());
        Ok((before - map.len()) as u64)
    }
}
