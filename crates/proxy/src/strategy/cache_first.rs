//! Cache-first with network fallback, for static assets.

use alpha_sync_core::{CacheHandle, RequestKey};

use super::{lookup, store};
use crate::fetch::Network;
use crate::request::{ProxyRequest, ProxyResponse};

/// Serve a static asset.
///
/// 1. A cache hit is returned as-is, with no network attempt.
/// 2. On a miss the network is consulted; an ok response is cached.
/// 3. If the network fails, navigations get the cached `fallback` document
///    when present. Everything else gets a plain-text 503 with `offline_text`.
pub async fn serve_static(
    cache: &CacheHandle<'_>, network: &dyn Network, request: &ProxyRequest, fallback: &RequestKey, offline_text: &str,
) -> ProxyResponse {
    let key = request.cache_key();

    if let Some(cached) = lookup(cache, &key).await {
        tracing::debug!("static cache hit for {}", request.url);
        return cached;
    }

    match network.fetch(request).await {
        Ok(response) => {
            if response.is_ok() {
                store(cache, &key, &response).await;
            }
            response
        }
        Err(e) => {
            tracing::debug!("failed to fetch {}: {e}", request.url);

            if request.is_navigation()
                && let Some(document) = lookup(cache, fallback).await
            {
                return document;
            }

            ProxyResponse::offline_text(offline_text)
        }
    }
}
