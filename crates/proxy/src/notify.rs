//! Push notification dispatch.
//!
//! Inbound push payloads are merged over a configured default notification
//! and handed to a [`Notifier`]. Clicks close the notification and, for the
//! `explore` action, bring the client's root window forward.

use std::sync::Arc;

use alpha_sync_core::config::NotificationConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::lifecycle::ClientSignals;

/// Action that opens the client.
pub const EXPLORE_ACTION: &str = "explore";

/// Action that only dismisses.
pub const CLOSE_ACTION: &str = "close";

/// A button shown on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

/// A notification ready to display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: Map<String, Value>,
    pub actions: Vec<NotificationAction>,
}

/// Displays and dismisses notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &Notification);

    async fn close(&self, id: &str);
}

/// User interaction with a displayed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationClick {
    pub notification_id: String,
    /// Action button pressed, or `None` for a click on the body.
    #[serde(default)]
    pub action: Option<String>,
}

/// What a click resulted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickOutcome {
    Focused,
    Opened,
    Dismissed,
}

pub struct NotificationDispatcher {
    defaults: NotificationConfig,
    notifier: Arc<dyn Notifier>,
    clients: Arc<dyn ClientSignals>,
}

impl NotificationDispatcher {
    pub fn new(defaults: NotificationConfig, notifier: Arc<dyn Notifier>, clients: Arc<dyn ClientSignals>) -> Self {
        Self { defaults, notifier, clients }
    }

    /// Build and display a notification for one push event.
    ///
    /// A missing, malformed or non-object payload shows the defaults.
    pub async fn on_push(&self, payload: Option<&[u8]>) -> Notification {
        let notification = self.build(payload);
        tracing::info!(id = %notification.id, "push received");
        self.notifier.show(&notification).await;
        notification
    }

    /// Close the clicked notification and route the action.
    pub async fn on_notification_click(&self, click: &NotificationClick) -> ClickOutcome {
        self.notifier.close(&click.notification_id).await;

        if click.action.as_deref() != Some(EXPLORE_ACTION) {
            tracing::debug!(id = %click.notification_id, action = ?click.action, "notification dismissed");
            return ClickOutcome::Dismissed;
        }

        let root = self.defaults.root_path.as_str();
        if self.clients.focus_window(root).await {
            ClickOutcome::Focused
        } else {
            self.clients.open_window(root).await;
            ClickOutcome::Opened
        }
    }

    fn build(&self, payload: Option<&[u8]>) -> Notification {
        let mut data = Map::new();
        data.insert("dateOfArrival".into(), json!(chrono::Utc::now().timestamp_millis()));
        data.insert("primaryKey".into(), json!(1));

        let mut body = self.defaults.body.clone();

        match payload.map(serde_json::from_slice::<Value>) {
            Some(Ok(Value::Object(fields))) => {
                if let Some(text) = fields.get("body").and_then(Value::as_str).filter(|t| !t.is_empty()) {
                    body = text.to_string();
                }
                data.extend(fields);
            }
            Some(Ok(_)) => tracing::debug!("push payload is not an object; using defaults"),
            Some(Err(e)) => tracing::warn!("invalid push payload: {e}"),
            None => {}
        }

        let action = |action: &str, title: &str| NotificationAction {
            action: action.into(),
            title: title.into(),
            icon: self.defaults.icon.clone(),
        };

        Notification {
            id: uuid::Uuid::now_v7().to_string(),
            title: self.defaults.title.clone(),
            body,
            icon: self.defaults.icon.clone(),
            badge: self.defaults.badge.clone(),
            vibrate: self.defaults.vibrate.clone(),
            data,
            actions: vec![action(EXPLORE_ACTION, "查看详情"), action(CLOSE_ACTION, "关闭")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingClients, RecordingNotifier};

    fn dispatcher(clients: RecordingClients) -> (NotificationDispatcher, Arc<RecordingNotifier>, Arc<RecordingClients>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let clients = Arc::new(clients);
        let dispatcher = NotificationDispatcher::new(NotificationConfig::default(), notifier.clone(), clients.clone());
        (dispatcher, notifier, clients)
    }

    #[tokio::test]
    async fn test_push_without_payload_uses_defaults() {
        let (dispatcher, notifier, _) = dispatcher(RecordingClients::default());

        let shown = dispatcher.on_push(None).await;

        assert_eq!(shown.title, "Alpha Social");
        assert_eq!(shown.body, "您有新的消息");
        assert_eq!(shown.icon, "/icon-192x192.png");
        assert_eq!(shown.badge, "/icon-192x192.png");
        assert_eq!(shown.vibrate, vec![100, 50, 100]);
        assert_eq!(shown.data.get("primaryKey"), Some(&json!(1)));
        assert!(shown.data.contains_key("dateOfArrival"));
        let actions: Vec<&str> = shown.actions.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(actions, vec!["explore", "close"]);
        assert_eq!(notifier.shown.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_push_payload_merges_over_defaults() {
        let (dispatcher, _, _) = dispatcher(RecordingClients::default());

        let shown = dispatcher
            .on_push(Some(br#"{"body":"new reply","postId":42,"primaryKey":7}"#))
            .await;

        assert_eq!(shown.body, "new reply");
        assert_eq!(shown.title, "Alpha Social");
        assert_eq!(shown.data.get("postId"), Some(&json!(42)));
        assert_eq!(shown.data.get("primaryKey"), Some(&json!(7)));
        assert!(shown.data.contains_key("dateOfArrival"));
    }

    #[tokio::test]
    async fn test_push_empty_body_keeps_default() {
        let (dispatcher, _, _) = dispatcher(RecordingClients::default());

        let shown = dispatcher.on_push(Some(br#"{"body":""}"#)).await;

        assert_eq!(shown.body, "您有新的消息");
    }

    #[tokio::test]
    async fn test_push_invalid_json_falls_back() {
        let (dispatcher, notifier, _) = dispatcher(RecordingClients::default());

        let shown = dispatcher.on_push(Some(b"not json")).await;

        assert_eq!(shown.body, "您有新的消息");
        assert_eq!(shown.data.len(), 2);
        assert_eq!(notifier.shown.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_explore_focuses_open_window() {
        let (dispatcher, notifier, clients) = dispatcher(RecordingClients::with_open_window());

        let click = NotificationClick { notification_id: "n1".into(), action: Some("explore".into()) };
        let outcome = dispatcher.on_notification_click(&click).await;

        assert_eq!(outcome, ClickOutcome::Focused);
        assert_eq!(clients.events(), vec!["focus:/"]);
        assert_eq!(*notifier.closed.lock().unwrap(), vec!["n1".to_string()]);
    }

    #[tokio::test]
    async fn test_explore_opens_window_when_none() {
        let (dispatcher, _, clients) = dispatcher(RecordingClients::default());

        let click = NotificationClick { notification_id: "n1".into(), action: Some("explore".into()) };
        let outcome = dispatcher.on_notification_click(&click).await;

        assert_eq!(outcome, ClickOutcome::Opened);
        assert_eq!(clients.events(), vec!["open:/"]);
    }

    #[tokio::test]
    async fn test_other_actions_only_dismiss() {
        let (dispatcher, notifier, clients) = dispatcher(RecordingClients::with_open_window());

        for action in [Some("close".to_string()), None] {
            let click = NotificationClick { notification_id: "n1".into(), action };
            assert_eq!(dispatcher.on_notification_click(&click).await, ClickOutcome::Dismissed);
        }

        assert!(clients.events().is_empty());
        assert_eq!(notifier.closed.lock().unwrap().len(), 2);
    }
}
