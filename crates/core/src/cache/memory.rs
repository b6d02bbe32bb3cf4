//! In-memory cache store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::entries::{CacheEntry, RequestKey, StoredResponse};
use super::store::CacheStore;
use crate::Error;

/// Cache store kept entirely in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    caches: RwLock<BTreeMap<String, Vec<CacheEntry>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn upsert(entries: &mut Vec<CacheEntry>, key: &RequestKey, response: &StoredResponse, now: &str) {
    let entry = CacheEntry { key: key.clone(), response: response.clone(), inserted_at: now.to_string() };
    match entries.iter_mut().find(|e| &e.key == key) {
        Some(existing) => *existing = entry,
        None => entries.push(entry),
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn open(&self, cache: &str) -> Result<(), Error> {
        self.caches.write().await.entry(cache.to_string()).or_default();
        Ok(())
    }

    async fn match_key(&self, cache: &str, key: &RequestKey) -> Result<Option<CacheEntry>, Error> {
        let caches = self.caches.read().await;
        Ok(caches
            .get(cache)
            .and_then(|entries| entries.iter().find(|e| &e.key == key))
            .cloned())
    }

    async fn put(&self, cache: &str, key: &RequestKey, response: &StoredResponse) -> Result<(), Error> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut caches = self.caches.write().await;
        upsert(caches.entry(cache.to_string()).or_default(), key, response, &now);
        Ok(())
    }

    async fn put_all(&self, cache: &str, entries: &[(RequestKey, StoredResponse)]) -> Result<(), Error> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut caches = self.caches.write().await;
        let target = caches.entry(cache.to_string()).or_default();
        for (key, response) in entries {
            upsert(target, key, response, &now);
        }
        Ok(())
    }

    async fn keys(&self, cache: &str) -> Result<Vec<RequestKey>, Error> {
        let caches = self.caches.read().await;
        Ok(caches
            .get(cache)
            .map(|entries| entries.iter().map(|e| e.key.clone()).collect())
            .unwrap_or_default())
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        Ok(self.caches.read().await.keys().cloned().collect())
    }

    async fn delete(&self, cache: &str) -> Result<bool, Error> {
        Ok(self.caches.write().await.remove(cache).is_some())
    }
}
