//! Bridge to the desktop shell.
//!
//! The proxy's client signals and notifications are queued here and picked
//! up by the shell, which polls `GET /__sync/signals`. The shell reports
//! whether its main window is open through `POST /__sync/ready`.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use alpha_sync_proxy::{ClientSignals, Notification, Notifier};
use async_trait::async_trait;
use serde::Serialize;

/// One instruction for the shell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShellSignal {
    Claim,
    Focus { path: String },
    Open { path: String },
    Show { notification: Notification },
    Close { id: String },
}

#[derive(Debug, Default)]
pub struct ShellBridge {
    window_open: AtomicBool,
    signals: Mutex<VecDeque<ShellSignal>>,
}

impl ShellBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_window_open(&self, open: bool) {
        self.window_open.store(open, Ordering::Release);
    }

    pub fn window_open(&self) -> bool {
        self.window_open.load(Ordering::Acquire)
    }

    /// Remove and return every queued signal, oldest first.
    pub fn drain(&self) -> Vec<ShellSignal> {
        match self.signals.lock() {
            Ok(mut signals) => signals.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }

    fn push(&self, signal: ShellSignal) {
        tracing::debug!(?signal, "shell signal");
        match self.signals.lock() {
            Ok(mut signals) => signals.push_back(signal),
            Err(poisoned) => poisoned.into_inner().push_back(signal),
        }
    }
}

#[async_trait]
impl ClientSignals for ShellBridge {
    async fn claim(&self) {
        self.push(ShellSignal::Claim);
    }

    async fn focus_window(&self, path: &str) -> bool {
        if !self.window_open() {
            return false;
        }
        self.push(ShellSignal::Focus { path: path.to_string() });
        true
    }

    async fn open_window(&self, path: &str) {
        self.push(ShellSignal::Open { path: path.to_string() });
        self.set_window_open(true);
    }
}

#[async_trait]
impl Notifier for ShellBridge {
    async fn show(&self, notification: &Notification) {
        self.push(ShellSignal::Show { notification: notification.clone() });
    }

    async fn close(&self, id: &str) {
        self.push(ShellSignal::Close { id: id.to_string() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_focus_requires_open_window() {
        let bridge = ShellBridge::new();

        assert!(!bridge.focus_window("/").await);
        assert!(bridge.drain().is_empty());

        bridge.set_window_open(true);
        assert!(bridge.focus_window("/").await);
        assert_eq!(bridge.drain(), vec![ShellSignal::Focus { path: "/".into() }]);
    }

    #[tokio::test]
    async fn test_drain_empties_queue_in_order() {
        let bridge = ShellBridge::new();
        bridge.claim().await;
        bridge.open_window("/").await;
        bridge.close("n1").await;

        assert_eq!(
            bridge.drain(),
            vec![ShellSignal::Claim, ShellSignal::Open { path: "/".into() }, ShellSignal::Close { id: "n1".into() }]
        );
        assert!(bridge.drain().is_empty());
        assert!(bridge.window_open());
    }

    #[test]
    fn test_signal_wire_format() {
        let json = serde_json::to_value(ShellSignal::Open { path: "/".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "open", "path": "/"}));
    }
}
