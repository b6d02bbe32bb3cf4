//! Network-first with cache fallback, for API calls.
//!
//! Social content changes often, so the live network always wins when it is
//! reachable. The cache only serves degraded-mode reads; there is no
//! freshness check or TTL on the fallback path.

use alpha_sync_core::CacheHandle;
use reqwest::Method;

use super::{lookup, store};
use crate::fetch::Network;
use crate::request::{ProxyRequest, ProxyResponse};

/// Serve an API call.
///
/// Ok GET responses are copied into the API cache. On network failure the
/// last cached response for the same request is returned; without one the
/// caller gets a 503 JSON body `{"error": offline_message, "offline": true}`.
pub async fn serve_api(
    cache: &CacheHandle<'_>, network: &dyn Network, request: &ProxyRequest, offline_message: &str,
) -> ProxyResponse {
    let key = request.cache_key();

    match network.fetch(request).await {
        Ok(response) => {
            if response.is_ok() && request.method == Method::GET {
                store(cache, &key, &response).await;
            }
            response
        }
        Err(e) => {
            tracing::debug!("network failed, trying cache for {}: {e}", request.url);
            match lookup(cache, &key).await {
                Some(cached) => cached,
                None => ProxyResponse::offline_json(offline_message),
            }
        }
    }
}
