//! The request interception entry point.

use std::sync::Arc;

use alpha_sync_core::config::OfflineMessages;
use alpha_sync_core::{AppConfig, CacheHandle, CacheName, CacheStore, Error, LocalDb, RequestKey};
use reqwest::Method;
use url::Url;

use crate::classify::{Classifier, RequestClass};
use crate::fetch::{Network, resolve};
use crate::lifecycle::Lifecycle;
use crate::queue::{SubmitOutcome, WriteQueue};
use crate::request::{ProxyRequest, ProxyResponse};
use crate::strategy::{serve_api, serve_static};

/// Routes intercepted requests to the right strategy and cache.
pub struct SyncProxy {
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    classifier: Classifier,
    lifecycle: Lifecycle,
    queue: WriteQueue,
    fallback: RequestKey,
    submit_path: String,
    messages: OfflineMessages,
}

impl SyncProxy {
    /// Build a proxy whose caches and write queue share one database.
    pub fn from_config(config: &AppConfig, db: LocalDb, network: Arc<dyn Network>) -> Result<Self, Error> {
        let store: Arc<dyn CacheStore> = Arc::new(db.clone());
        Self::with_store(config, store, db, network)
    }

    /// Build a proxy with a separate cache store.
    pub fn with_store(
        config: &AppConfig, store: Arc<dyn CacheStore>, db: LocalDb, network: Arc<dyn Network>,
    ) -> Result<Self, Error> {
        let classifier =
            Classifier::from_patterns(&config.api_patterns).map_err(|e| Error::InvalidInput(e.to_string()))?;

        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let at_origin = |path: &str| -> Result<Url, Error> {
            resolve(&origin, path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
        };

        let manifest = config
            .precache
            .iter()
            .map(|path| at_origin(path))
            .collect::<Result<Vec<_>, _>>()?;
        let fallback = RequestKey::get(at_origin(&config.fallback_document)?.as_str());
        let submit_url = at_origin(&config.submit_path)?;

        let lifecycle = Lifecycle::new(store.clone(), network.clone(), config.cache_version(), manifest);
        let queue = WriteQueue::new(db, network.clone(), submit_url);

        Ok(Self {
            store,
            network,
            classifier,
            lifecycle,
            queue,
            fallback,
            submit_path: config.submit_path.clone(),
            messages: config.messages.clone(),
        })
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn queue(&self) -> &WriteQueue {
        &self.queue
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Answer an intercepted request.
    ///
    /// Returns `None` when the request is not intercepted and should go to
    /// the network untouched: before activation, and for non-GET requests
    /// outside the API patterns. Intercepted requests always get a response.
    pub async fn intercept(&self, request: &ProxyRequest) -> Option<ProxyResponse> {
        if !self.lifecycle.state().await.can_intercept() {
            return None;
        }

        match self.classifier.classify(&request.method, &request.url) {
            RequestClass::Unhandled => None,
            RequestClass::Static => Some(self.serve_static(request).await),
            RequestClass::Api if self.is_submission(request) => Some(self.submit(request).await),
            RequestClass::Api => Some(self.serve_api(request).await),
        }
    }

    fn is_submission(&self, request: &ProxyRequest) -> bool {
        request.method == Method::POST && request.url.path() == self.submit_path
    }

    async fn serve_static(&self, request: &ProxyRequest) -> ProxyResponse {
        let name = self.lifecycle.version().name(CacheName::StaticAssets);
        match CacheHandle::open(self.store.as_ref(), &name).await {
            Ok(cache) => {
                serve_static(&cache, self.network.as_ref(), request, &self.fallback, &self.messages.offline_page).await
            }
            Err(e) => {
                tracing::warn!(cache = %name, "cache unavailable: {e}");
                self.forward(request, || ProxyResponse::offline_text(&self.messages.offline_page))
                    .await
            }
        }
    }

    async fn serve_api(&self, request: &ProxyRequest) -> ProxyResponse {
        let name = self.lifecycle.version().name(CacheName::Api);
        match CacheHandle::open(self.store.as_ref(), &name).await {
            Ok(cache) => serve_api(&cache, self.network.as_ref(), request, &self.messages.offline_api).await,
            Err(e) => {
                tracing::warn!(cache = %name, "cache unavailable: {e}");
                self.forward(request, || ProxyResponse::offline_json(&self.messages.offline_api))
                    .await
            }
        }
    }

    /// Content submission: delivered when online, queued when not.
    ///
    /// A body that is not JSON cannot be replayed faithfully, so it takes the
    /// plain API path instead.
    async fn submit(&self, request: &ProxyRequest) -> ProxyResponse {
        let Some(payload) = request.json_body() else {
            return self.serve_api(request).await;
        };

        match self.queue.submit(request, &payload).await {
            Ok(SubmitOutcome::Delivered(response)) => response,
            Ok(SubmitOutcome::Queued(write)) => ProxyResponse::queued(&write),
            Err(e) => {
                tracing::error!("failed to queue submission: {e}");
                ProxyResponse::offline_json(&self.messages.offline_api)
            }
        }
    }

    async fn forward(&self, request: &ProxyRequest, offline: impl FnOnce() -> ProxyResponse) -> ProxyResponse {
        match self.network.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("failed to fetch {}: {e}", request.url);
                offline()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleState;
    use crate::request::ResponseSource;
    use crate::testing::{FakeNetwork, RecordingClients, url};
    use reqwest::StatusCode;
    use serde_json::json;

    async fn active_proxy() -> (SyncProxy, Arc<FakeNetwork>) {
        let network = Arc::new(FakeNetwork::online());
        let db = LocalDb::open_in_memory().await.unwrap();
        let proxy = SyncProxy::from_config(&AppConfig::default(), db, network.clone()).unwrap();
        proxy.lifecycle().install().await.unwrap();
        proxy.lifecycle().activate(&RecordingClients::default()).await.unwrap();
        (proxy, network)
    }

    #[tokio::test]
    async fn test_not_intercepted_before_activation() {
        let network = Arc::new(FakeNetwork::online());
        let db = LocalDb::open_in_memory().await.unwrap();
        let proxy = SyncProxy::from_config(&AppConfig::default(), db, network.clone()).unwrap();

        let request = ProxyRequest::get(url("http://localhost:5000/index.html"));
        assert!(proxy.intercept(&request).await.is_none());
        assert_eq!(network.call_count(), 0);
    }

    #[tokio::test]
    async fn test_precached_asset_served_offline() {
        let (proxy, network) = active_proxy().await;
        assert_eq!(proxy.lifecycle().state().await, LifecycleState::Active);
        network.set_offline(true);
        let before = network.call_count();

        let response = proxy
            .intercept(&ProxyRequest::get(url("http://localhost:5000/manifest.json")))
            .await
            .unwrap();

        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(network.call_count(), before);
    }

    #[tokio::test]
    async fn test_offline_reinstall_keeps_serving() {
        let (proxy, network) = active_proxy().await;
        network.set_offline(true);

        assert!(proxy.lifecycle().install().await.is_err());

        assert_eq!(proxy.lifecycle().state().await, LifecycleState::Active);
        let response = proxy
            .intercept(&ProxyRequest::get(url("http://localhost:5000/manifest.json")))
            .await
            .unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn test_offline_navigation_gets_fallback_document() {
        let (proxy, network) = active_proxy().await;
        network.set_offline(true);

        let response = proxy
            .intercept(&ProxyRequest::navigate(url("http://localhost:5000/profile/7")))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, "network:http://localhost:5000/index.html");
    }

    #[tokio::test]
    async fn test_offline_uncached_asset_is_503() {
        let (proxy, network) = active_proxy().await;
        network.set_offline(true);

        let response = proxy
            .intercept(&ProxyRequest::get(url("http://localhost:5000/static/app.js")))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body, "网络连接失败");
    }

    #[tokio::test]
    async fn test_api_offline_without_cache_is_503_json() {
        let (proxy, network) = active_proxy().await;
        network.set_offline(true);

        let response = proxy
            .intercept(&ProxyRequest::get(url("http://localhost:5000/api/contents")))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.json().unwrap(), json!({"error": "网络连接失败，请检查网络设置", "offline": true}));
    }

    #[tokio::test]
    async fn test_api_served_stale_when_offline() {
        let (proxy, network) = active_proxy().await;
        let feed = "http://localhost:5000/api/contents";
        network.route(feed, StatusCode::OK, r#"[{"id":1}]"#);
        proxy.intercept(&ProxyRequest::get(url(feed))).await.unwrap();

        network.set_offline(true);
        let response = proxy.intercept(&ProxyRequest::get(url(feed))).await.unwrap();

        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.body, r#"[{"id":1}]"#);
    }

    #[tokio::test]
    async fn test_offline_submission_is_queued() {
        let (proxy, network) = active_proxy().await;
        network.set_offline(true);

        let request = ProxyRequest::post_json(url("http://localhost:5000/api/contents"), &json!({"text": "hello"}));
        let response = proxy.intercept(&request).await.unwrap();

        assert_eq!(response.status, StatusCode::ACCEPTED);
        let body = response.json().unwrap();
        assert_eq!(body["queued"], json!(true));
        assert_eq!(body["offline"], json!(true));

        let pending = proxy.queue().pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(body["id"], json!(pending[0].id));
    }

    #[tokio::test]
    async fn test_submission_to_production_host_keeps_target() {
        let (proxy, network) = active_proxy().await;
        let target = "https://www.alpha-social.com/api/contents";
        let before = network.call_count();

        let request = ProxyRequest::post_json(url(target), &json!({"text": "hello"}));
        let response = proxy.intercept(&request).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        let sent: Vec<ProxyRequest> = network.calls().into_iter().skip(before).collect();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url.as_str(), target);
    }

    #[tokio::test]
    async fn test_non_api_post_passes_through() {
        let (proxy, _) = active_proxy().await;

        let request = ProxyRequest::post_json(url("http://localhost:5000/login"), &json!({}));
        assert!(proxy.intercept(&request).await.is_none());
    }

    #[tokio::test]
    async fn test_bad_api_pattern_is_rejected() {
        let config = AppConfig { api_patterns: vec!["*.example.com".into()], ..AppConfig::default() };
        let db = LocalDb::open_in_memory().await.unwrap();

        let result = SyncProxy::from_config(&config, db, Arc::new(FakeNetwork::online()));

        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
