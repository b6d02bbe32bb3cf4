//! Periodic background sync.

use std::sync::Arc;
use std::time::Duration;

use alpha_sync_proxy::{SYNC_TAG, SyncProxy};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Fire the background sync tag every `every` until the task is aborted.
///
/// The first drain runs one period after startup.
pub fn spawn_periodic_drain(proxy: Arc<SyncProxy>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            interval.tick().await;
            match proxy.queue().on_sync(SYNC_TAG).await {
                Ok(Some(report)) if report.attempted > 0 => {
                    tracing::info!(delivered = report.delivered, failed = report.failed, "background sync");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("background sync failed: {e}"),
            }
        }
    })
}
