//! Fakes shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use url::Url;

use crate::fetch::{Network, NetworkError};
use crate::lifecycle::ClientSignals;
use crate::notify::{Notification, Notifier};
use crate::request::{ProxyRequest, ProxyResponse};

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

/// Network that answers from a route table, or fails everything while offline.
///
/// Unknown routes answer 200 with body `"network:{url}"`.
#[derive(Default)]
pub struct FakeNetwork {
    offline: Mutex<bool>,
    routes: Mutex<HashMap<String, (StatusCode, String)>>,
    calls: Mutex<Vec<ProxyRequest>>,
}

impl FakeNetwork {
    pub fn online() -> Self {
        Self::default()
    }

    pub fn offline() -> Self {
        let network = Self::default();
        network.set_offline(true);
        network
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    pub fn route(&self, url: &str, status: StatusCode, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, body.to_string()));
    }

    pub fn calls(&self) -> Vec<ProxyRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, NetworkError> {
        self.calls.lock().unwrap().push(request.clone());
        if *self.offline.lock().unwrap() {
            return Err(NetworkError::Unreachable("connection refused".into()));
        }

        let (status, body) = self
            .routes
            .lock()
            .unwrap()
            .get(request.url.as_str())
            .cloned()
            .unwrap_or_else(|| (StatusCode::OK, format!("network:{}", request.url)));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        Ok(ProxyResponse::new(status, headers, body))
    }
}

/// Client signal sink that records every call.
#[derive(Default)]
pub struct RecordingClients {
    pub has_window: Mutex<bool>,
    pub events: Mutex<Vec<String>>,
}

impl RecordingClients {
    pub fn with_open_window() -> Self {
        let clients = Self::default();
        *clients.has_window.lock().unwrap() = true;
        clients
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientSignals for RecordingClients {
    async fn claim(&self) {
        self.events.lock().unwrap().push("claim".into());
    }

    async fn focus_window(&self, path: &str) -> bool {
        let focused = *self.has_window.lock().unwrap();
        if focused {
            self.events.lock().unwrap().push(format!("focus:{path}"));
        }
        focused
    }

    async fn open_window(&self, path: &str) {
        self.events.lock().unwrap().push(format!("open:{path}"));
    }
}

/// Notifier that records shown and closed notifications.
#[derive(Default)]
pub struct RecordingNotifier {
    pub shown: Mutex<Vec<Notification>>,
    pub closed: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn show(&self, notification: &Notification) {
        self.shown.lock().unwrap().push(notification.clone());
    }

    async fn close(&self, id: &str) {
        self.closed.lock().unwrap().push(id.to_string());
    }
}
