//! Deferred write queue.
//!
//! Content submissions that cannot reach the network are persisted and
//! acknowledged as queued instead of failing. A later drain replays them in
//! enqueue order and removes each one only after a 2xx answer.
//!
//! Failed replays stay queued with their attempt count bumped; there is no
//! retry cap. Each write is replayed to the URL it was originally sent to.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use alpha_sync_core::{Error, LocalDb, PendingWrite};
use serde::Serialize;
use url::Url;

use crate::fetch::Network;
use crate::request::{ProxyRequest, ProxyResponse};

/// Background sync tag that triggers a drain.
pub const SYNC_TAG: &str = "background-sync-posts";

/// What happened to a submission.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// The network answered; the response is passed through unchanged.
    Delivered(ProxyResponse),
    /// The network was unreachable; the payload is queued for replay.
    Queued(PendingWrite),
}

/// Summary of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Writes whose removal or attempt bump could not be stored. A delivered
    /// write in this count is still queued and will be sent again.
    pub store_errors: usize,
    /// Another drain was already running; nothing was attempted.
    pub skipped: bool,
}

/// Clears the drain flag when a drain pass ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Durable queue of content submissions.
pub struct WriteQueue {
    db: LocalDb,
    network: Arc<dyn Network>,
    submit_url: Url,
    draining: AtomicBool,
}

impl WriteQueue {
    pub fn new(db: LocalDb, network: Arc<dyn Network>, submit_url: Url) -> Self {
        Self { db, network, submit_url, draining: AtomicBool::new(false) }
    }

    pub fn submit_url(&self) -> &Url {
        &self.submit_url
    }

    /// Send a submission as-is, queuing `payload` for its URL if the network
    /// is unreachable. `payload` is the request's parsed JSON body.
    pub async fn submit(&self, request: &ProxyRequest, payload: &serde_json::Value) -> Result<SubmitOutcome, Error> {
        match self.network.fetch(request).await {
            Ok(response) => Ok(SubmitOutcome::Delivered(response)),
            Err(e) => {
                tracing::info!(url = %request.url, "submission offline, queuing: {e}");
                let write = self.db.enqueue_write(payload, Some(request.url.as_str())).await?;
                tracing::debug!(id = %write.id, "pending write queued");
                Ok(SubmitOutcome::Queued(write))
            }
        }
    }

    /// Persist a payload for later replay to the default submit URL.
    pub async fn enqueue(&self, payload: &serde_json::Value) -> Result<PendingWrite, Error> {
        let write = self.db.enqueue_write(payload, None).await?;
        tracing::debug!(id = %write.id, "pending write queued");
        Ok(write)
    }

    /// Number of queued writes.
    pub async fn pending_count(&self) -> Result<u64, Error> {
        self.db.pending_write_count().await
    }

    fn replay_url(&self, write: &PendingWrite) -> Url {
        match write.target_url.as_deref().map(Url::parse) {
            Some(Ok(url)) => url,
            Some(Err(e)) => {
                tracing::warn!(id = %write.id, "bad stored target, using submit URL: {e}");
                self.submit_url.clone()
            }
            None => self.submit_url.clone(),
        }
    }

    /// Pending writes in replay order.
    pub async fn pending(&self) -> Result<Vec<PendingWrite>, Error> {
        self.db.pending_writes().await
    }

    /// Handle a background sync event. Tags other than [`SYNC_TAG`] are ignored.
    pub async fn on_sync(&self, tag: &str) -> Result<Option<DrainReport>, Error> {
        if tag != SYNC_TAG {
            tracing::debug!(tag, "ignoring sync tag");
            return Ok(None);
        }
        self.drain().await.map(Some)
    }

    /// Replay every pending write, oldest first, one at a time.
    ///
    /// If a drain is already in progress this returns immediately with
    /// `skipped` set.
    pub async fn drain(&self) -> Result<DrainReport, Error> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("drain already in progress");
            return Ok(DrainReport { skipped: true, ..Default::default() });
        }
        let _guard = DrainGuard(&self.draining);

        let mut report = DrainReport::default();
        for write in self.db.pending_writes().await? {
            report.attempted += 1;
            let request = ProxyRequest::post_json(self.replay_url(&write), &write.payload);

            let failure = match self.network.fetch(&request).await {
                Ok(response) if response.is_ok() => None,
                Ok(response) => Some(format!("status {}", response.status.as_u16())),
                Err(e) => Some(e.to_string()),
            };

            match failure {
                None => {
                    report.delivered += 1;
                    match self.db.remove_pending_write(&write.id).await {
                        Ok(_) => tracing::info!(id = %write.id, "post synced successfully"),
                        Err(e) => {
                            report.store_errors += 1;
                            tracing::warn!(id = %write.id, "post synced but still queued: {e}");
                        }
                    }
                }
                Some(reason) => {
                    report.failed += 1;
                    match self.db.record_write_attempt(&write.id).await {
                        Ok(attempts) => {
                            tracing::warn!(id = %write.id, attempts = ?attempts, "failed to sync post: {reason}");
                        }
                        Err(e) => {
                            report.store_errors += 1;
                            tracing::warn!(id = %write.id, "failed to sync post: {reason}; attempt not recorded: {e}");
                        }
                    }
                }
            }
        }

        Ok(report)
    }
}
