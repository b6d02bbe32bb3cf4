//! Intercepted request and response model.

use alpha_sync_core::{PendingWrite, RequestKey, StoredResponse};
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use url::Url;

/// How the client issued the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// A full-page navigation; eligible for the fallback document.
    Navigate,
    /// Anything else (scripts, images, XHR).
    #[default]
    Resource,
}

/// An outbound client request observed by the proxy.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Canonical absolute URL.
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub mode: RequestMode,
}

impl ProxyRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new(), body: Bytes::new(), mode: RequestMode::default() }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn navigate(url: Url) -> Self {
        Self::get(url).with_mode(RequestMode::Navigate)
    }

    /// A POST carrying `payload` as a JSON body.
    pub fn post_json(url: Url, payload: &serde_json::Value) -> Self {
        let mut request = Self::new(Method::POST, url);
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        request.body = Bytes::from(payload.to_string());
        request
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Cache identity: method plus canonical URL.
    pub fn cache_key(&self) -> RequestKey {
        RequestKey::new(self.method.as_str(), self.url.as_str())
    }

    /// The body parsed as JSON, if it is JSON.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// Built by the proxy itself (offline errors, queued acknowledgements).
    Synthetic,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Synthetic => "synthetic",
        }
    }
}

/// A response handed back to the client.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl ProxyResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: body.into(), source: ResponseSource::Network }
    }

    /// Status in the 200-299 range.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    /// Copy the response for storage, leaving `self` intact for the caller.
    pub fn to_stored(&self) -> StoredResponse {
        StoredResponse {
            status: self.status.as_u16(),
            headers: self
                .headers
                .iter()
                .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
                .collect(),
            body: self.body.to_vec(),
        }
    }

    /// Rebuild a response from a cache entry.
    pub fn from_stored(stored: StoredResponse) -> Self {
        let headers = stored
            .headers
            .iter()
            .filter_map(|(name, value)| {
                let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
                let value = HeaderValue::from_str(value).ok()?;
                Some((name, value))
            })
            .collect();
        let status = StatusCode::from_u16(stored.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self { status, headers, body: Bytes::from(stored.body), source: ResponseSource::Cache }
    }

    /// Synthetic 503 with a plain-text body.
    pub fn offline_text(message: &str) -> Self {
        Self::synthetic(
            StatusCode::SERVICE_UNAVAILABLE,
            "text/plain; charset=utf-8",
            Bytes::from(message.to_string()),
        )
    }

    /// Synthetic 503 with body `{"error": message, "offline": true}`.
    pub fn offline_json(message: &str) -> Self {
        let body = serde_json::json!({ "error": message, "offline": true });
        Self::synthetic(StatusCode::SERVICE_UNAVAILABLE, "application/json", Bytes::from(body.to_string()))
    }

    /// Synthetic 202 acknowledging a submission parked in the write queue.
    pub fn queued(write: &PendingWrite) -> Self {
        let body = serde_json::json!({ "queued": true, "offline": true, "id": write.id });
        Self::synthetic(StatusCode::ACCEPTED, "application/json", Bytes::from(body.to_string()))
    }

    fn synthetic(status: StatusCode, content_type: &'static str, body: Bytes) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self { status, headers, body, source: ResponseSource::Synthetic }
    }

    /// The body parsed as JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_cache_key_uses_method_and_url() {
        let request = ProxyRequest::get(url("http://localhost:5000/index.html"));
        let key = request.cache_key();
        assert_eq!(key.method, "GET");
        assert_eq!(key.url, "http://localhost:5000/index.html");
    }

    #[test]
    fn test_post_json() {
        let request = ProxyRequest::post_json(url("http://localhost:5000/api/contents"), &json!({"text": "hello"}));
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(request.json_body(), Some(json!({"text": "hello"})));
    }

    #[test]
    fn test_navigate_mode() {
        assert!(ProxyRequest::navigate(url("http://localhost:5000/")).is_navigation());
        assert!(!ProxyRequest::get(url("http://localhost:5000/")).is_navigation());
    }

    #[test]
    fn test_stored_copy_is_independent() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        let response = ProxyResponse::new(StatusCode::OK, headers, "<html></html>");

        let stored = response.to_stored();
        drop(response);

        let rebuilt = ProxyResponse::from_stored(stored);
        assert_eq!(rebuilt.status, StatusCode::OK);
        assert_eq!(rebuilt.headers.get(CONTENT_TYPE).unwrap(), "text/html");
        assert_eq!(&rebuilt.body[..], b"<html></html>");
        assert_eq!(rebuilt.source, ResponseSource::Cache);
    }

    #[test]
    fn test_offline_json_shape() {
        let response = ProxyResponse::offline_json("offline");
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.json().unwrap(), json!({"error": "offline", "offline": true}));
        assert_eq!(response.source, ResponseSource::Synthetic);
    }

    #[test]
    fn test_offline_text() {
        let response = ProxyResponse::offline_text("网络连接失败");
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(std::str::from_utf8(&response.body).unwrap(), "网络连接失败");
    }
}
