//! Cache entry types.

use serde::{Deserialize, Serialize};

use super::hash::compute_cache_key;

/// Normalized request identity used as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    /// Build a key. The method is uppercased; the URL must already be canonical.
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self { method: method.to_ascii_uppercase(), url: url.into() }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// SHA-256 hex digest addressing this key in the store.
    pub fn hash(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }
}

/// An owned copy of a response, independent of the one returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// A cached response with its key and insertion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: RequestKey,
    pub response: StoredResponse,
    pub inserted_at: String,
}
