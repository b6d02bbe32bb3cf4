//! The network collaborator.
//!
//! Strategies talk to the network only through the [`Network`] trait so a
//! fake can stand in for it. [`HttpNetwork`] is the reqwest-backed
//! implementation used at runtime.
//!
//! ### Failure semantics
//! - A response with any status is a success at this layer; strategies decide
//!   what an ok status means.
//! - DNS, connect, TLS and timeout failures surface as [`NetworkError`] and
//!   are recovered by the caller (cache fallback or queuing).
//! - There is no per-request deadline beyond the client's own timeout.

pub mod url;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{self, HeaderMap};

pub use self::url::{UrlError, canonicalize, resolve};
use crate::request::{ProxyRequest, ProxyResponse};

/// Errors from the network collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkError {
    /// Host unreachable, connection refused, DNS or TLS failure.
    #[error("network unreachable: {0}")]
    Unreachable(String),

    /// The request did not complete within the client timeout.
    #[error("request timeout")]
    Timeout,

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The HTTP client could not be built.
    #[error("client setup failed: {0}")]
    Setup(Arc<reqwest::Error>),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { NetworkError::Timeout } else { NetworkError::Unreachable(err.to_string()) }
    }
}

/// Something that can perform a fetch.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, NetworkError>;
}

/// Configuration for the HTTP network collaborator.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "alpha-sync/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "alpha-sync/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 5 }
    }
}

impl FetchConfig {
    pub fn from_app_config(config: &alpha_sync_core::AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), ..Default::default() }
    }
}

/// Headers that describe a single hop and must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "host",
    "content-length",
];

fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// reqwest-backed network collaborator.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    http: Client,
    config: FetchConfig,
}

impl HttpNetwork {
    /// Create a new network client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, NetworkError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| NetworkError::Setup(Arc::new(e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, NetworkError> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(forwardable_headers(&request.headers))
            .body(request.body.clone())
            .send()
            .await?;

        let status = response.status();
        let mut headers = response.headers().clone();
        headers.remove(header::TRANSFER_ENCODING);
        headers.remove(header::CONNECTION);

        let bytes = response.bytes().await.map_err(|e| NetworkError::Body(e.to_string()))?;

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(ProxyResponse::new(status, headers, bytes))
    }
}
