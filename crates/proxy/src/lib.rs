//! Offline cache and sync proxy.
//!
//! Every outbound request of the client passes through [`SyncProxy`], which
//! classifies it, picks a fetch strategy and consults the injected cache
//! store. Content submissions that fail for lack of connectivity are parked
//! in the deferred write queue and replayed later. Push notifications arrive
//! on an independent channel handled by the notification dispatcher.

pub mod classify;
pub mod fetch;
pub mod lifecycle;
pub mod notify;
pub mod proxy;
pub mod queue;
pub mod request;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::{ApiPattern, Classifier, PatternError, RequestClass};
pub use fetch::{FetchConfig, HttpNetwork, Network, NetworkError};
pub use lifecycle::{ActivateReport, ClientSignals, InstallReport, Lifecycle, LifecycleState};
pub use notify::{ClickOutcome, Notification, NotificationAction, NotificationClick, NotificationDispatcher, Notifier};
pub use proxy::SyncProxy;
pub use queue::{DrainReport, SYNC_TAG, SubmitOutcome, WriteQueue};
pub use request::{ProxyRequest, ProxyResponse, RequestMode, ResponseSource};
