//! HTTP surface of the proxy.
//!
//! `/__sync/*` routes drive lifecycle, sync and push events from the shell.
//! Everything else is an intercepted client request.

use std::sync::Arc;

use alpha_sync_core::PendingWrite;
use alpha_sync_proxy::fetch::{UrlError, canonicalize, resolve};
use alpha_sync_proxy::{
    ActivateReport, DrainReport, InstallReport, Notification, NotificationClick, NotificationDispatcher, ProxyRequest,
    ProxyResponse, RequestMode, SYNC_TAG, SyncProxy,
};
use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{ACCEPT, CONTENT_LENGTH, HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::bridge::{ShellBridge, ShellSignal};
use crate::error::ServerError;

/// Largest request body the proxy will buffer.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Tells the client which path produced a response.
const SOURCE_HEADER: HeaderName = HeaderName::from_static("x-alpha-sync-source");

#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<SyncProxy>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub bridge: Arc<ShellBridge>,
    pub origin: Arc<Url>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/__sync/status", get(status))
        .route("/__sync/install", post(install))
        .route("/__sync/activate", post(activate))
        .route("/__sync/sync", post(sync))
        .route("/__sync/push", post(push))
        .route("/__sync/notification-click", post(notification_click))
        .route("/__sync/signals", get(signals))
        .route("/__sync/pending", get(pending))
        .route("/__sync/ready", post(ready))
        .fallback(intercept)
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: String,
    pub version: String,
    pub pending: u64,
}

/// GET /__sync/status
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ServerError> {
    let lifecycle = state.proxy.lifecycle();
    let pending = state.proxy.queue().pending_count().await?;
    Ok(Json(StatusResponse {
        state: lifecycle.state().await.to_string(),
        version: lifecycle.version().version().to_string(),
        pending,
    }))
}

/// POST /__sync/install
pub async fn install(State(state): State<AppState>) -> Result<Json<InstallReport>, ServerError> {
    Ok(Json(state.proxy.lifecycle().install().await?))
}

/// POST /__sync/activate
pub async fn activate(State(state): State<AppState>) -> Result<Json<ActivateReport>, ServerError> {
    Ok(Json(state.proxy.lifecycle().activate(state.bridge.as_ref()).await?))
}

#[derive(Debug, Deserialize)]
pub struct SyncParams {
    #[serde(default = "default_tag")]
    pub tag: String,
}

fn default_tag() -> String {
    SYNC_TAG.into()
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub tag: String,
    /// `None` when the tag is not one the queue listens for.
    pub report: Option<DrainReport>,
}

/// POST /__sync/sync
///
/// An empty body syncs the default tag.
pub async fn sync(State(state): State<AppState>, body: Bytes) -> Result<Json<SyncResponse>, ServerError> {
    let params = if body.is_empty() {
        SyncParams { tag: default_tag() }
    } else {
        serde_json::from_slice::<SyncParams>(&body).map_err(|e| ServerError::BadRequest(e.to_string()))?
    };
    let report = state.proxy.queue().on_sync(&params.tag).await?;
    Ok(Json(SyncResponse { tag: params.tag, report }))
}

/// POST /__sync/push
///
/// The raw body is the push payload; an empty body means no payload.
pub async fn push(State(state): State<AppState>, body: Bytes) -> Json<Notification> {
    let payload = (!body.is_empty()).then_some(body.as_ref());
    Json(state.dispatcher.on_push(payload).await)
}

/// POST /__sync/notification-click
pub async fn notification_click(
    State(state): State<AppState>, Json(click): Json<NotificationClick>,
) -> Json<serde_json::Value> {
    let outcome = state.dispatcher.on_notification_click(&click).await;
    Json(serde_json::json!({ "outcome": outcome }))
}

/// GET /__sync/signals
pub async fn signals(State(state): State<AppState>) -> Json<Vec<ShellSignal>> {
    Json(state.bridge.drain())
}

/// GET /__sync/pending
pub async fn pending(State(state): State<AppState>) -> Result<Json<Vec<PendingWrite>>, ServerError> {
    Ok(Json(state.proxy.queue().pending().await?))
}

#[derive(Debug, Deserialize)]
pub struct ReadyParams {
    #[serde(default = "default_true")]
    pub window_open: bool,
}

fn default_true() -> bool {
    true
}

/// POST /__sync/ready
pub async fn ready(State(state): State<AppState>, Json(params): Json<ReadyParams>) -> StatusCode {
    state.bridge.set_window_open(params.window_open);
    tracing::info!(window_open = params.window_open, "shell ready");
    StatusCode::NO_CONTENT
}

/// Fallback: every non-control request goes through the proxy.
pub async fn intercept(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => return ServerError::BadRequest(format!("unreadable body: {e}")).into_response(),
    };

    let request = match to_proxy_request(&state.origin, &parts.method, &parts.uri, &parts.headers, body) {
        Ok(request) => request,
        Err(e) => return ServerError::BadRequest(format!("{}: {e}", parts.uri)).into_response(),
    };

    if let Some(response) = state.proxy.intercept(&request).await {
        return to_response(response);
    }

    match state.proxy.network().fetch(&request).await {
        Ok(response) => to_response(response),
        Err(e) => {
            tracing::warn!("pass-through failed for {}: {e}", request.url);
            let body = serde_json::json!({ "code": "NETWORK_ERROR", "message": e.to_string() });
            (StatusCode::BAD_GATEWAY, Json(body)).into_response()
        }
    }
}

/// Build the proxy's view of an inbound request.
///
/// Absolute-form targets are taken as-is; origin-form targets are resolved
/// against `origin`.
pub fn to_proxy_request(
    origin: &Url, method: &Method, uri: &Uri, headers: &HeaderMap, body: Bytes,
) -> Result<ProxyRequest, UrlError> {
    let url = if uri.scheme().is_some() {
        canonicalize(&uri.to_string())?
    } else {
        let target = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        resolve(origin, target)?
    };

    let mode = if is_navigation(method, headers) { RequestMode::Navigate } else { RequestMode::Resource };

    let mut request = ProxyRequest::new(method.clone(), url).with_mode(mode);
    request.headers = headers.clone();
    request.body = body;
    Ok(request)
}

fn is_navigation(method: &Method, headers: &HeaderMap) -> bool {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if header("sec-fetch-mode").is_some_and(|mode| mode.eq_ignore_ascii_case("navigate")) {
        return true;
    }
    method == Method::GET && header(ACCEPT.as_str()).is_some_and(|accept| accept.contains("text/html"))
}

fn to_response(response: ProxyResponse) -> Response {
    let source = response.source;
    let mut headers = response.headers;
    headers.remove(CONTENT_LENGTH);
    headers.insert(SOURCE_HEADER, HeaderValue::from_static(source.as_str()));

    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = response.status;
    *out.headers_mut() = headers;
    out
}
