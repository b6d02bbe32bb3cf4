//! Fetch strategies.
//!
//! Both strategies always produce a response. Network failures turn into a
//! cache fallback or a synthetic 503; cache store failures are logged and
//! treated as a miss (reads) or skipped (writes).
//!
//! A response is copied into the cache before the original is returned, so
//! the caller and the cache never share one body.

pub mod cache_first;
pub mod network_first;

pub use cache_first::serve_static;
pub use network_first::serve_api;

use alpha_sync_core::{CacheHandle, RequestKey};

use crate::request::ProxyResponse;

async fn lookup(cache: &CacheHandle<'_>, key: &RequestKey) -> Option<ProxyResponse> {
    match cache.match_key(key).await {
        Ok(entry) => entry.map(|e| ProxyResponse::from_stored(e.response)),
        Err(e) => {
            tracing::warn!(cache = cache.name(), url = %key.url, "cache read failed: {e}");
            None
        }
    }
}

async fn store(cache: &CacheHandle<'_>, key: &RequestKey, response: &ProxyResponse) {
    if let Err(e) = cache.put(key, &response.to_stored()).await {
        tracing::warn!(cache = cache.name(), url = %key.url, "cache write failed: {e}");
    }
}
