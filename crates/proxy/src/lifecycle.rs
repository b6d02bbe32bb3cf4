//! Cache lifecycle across deployments.
//!
//! A [`Lifecycle`] owns one cache version. `install` populates the static
//! cache from the precache manifest; `activate` sweeps every cache belonging
//! to another version and then claims open clients. The proxy only
//! intercepts requests while the lifecycle is active.

use std::fmt;
use std::sync::Arc;

use alpha_sync_core::{CacheHandle, CacheName, CacheStore, CacheVersion, Error};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use url::Url;

use crate::fetch::Network;
use crate::request::ProxyRequest;

/// Outbound signals to the client windows.
#[async_trait]
pub trait ClientSignals: Send + Sync {
    /// Take control of already-open clients without a reload.
    async fn claim(&self);

    /// Focus an existing window showing `path`. Returns false if none is open.
    async fn focus_window(&self, path: &str) -> bool;

    /// Open a new window at `path`.
    async fn open_window(&self, path: &str);
}

/// Lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing installed yet.
    Idle,
    Installing,
    /// Precache complete; waiting for activation.
    Installed,
    Activating,
    /// Controlling clients; requests are intercepted.
    Active,
    /// Install failed; this version never takes over.
    Redundant,
}

impl LifecycleState {
    pub fn can_intercept(&self) -> bool {
        matches!(self, LifecycleState::Active)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub cache: String,
    pub cached: usize,
    /// Activation may proceed without waiting for old clients to close.
    pub skip_waiting: bool,
}

/// Result of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    /// Stale cache names that were deleted.
    pub deleted: Vec<String>,
}

/// Install/activate state machine for one cache version.
pub struct Lifecycle {
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    version: CacheVersion,
    manifest: Vec<Url>,
    state: RwLock<LifecycleState>,
}

impl Lifecycle {
    pub fn new(
        store: Arc<dyn CacheStore>, network: Arc<dyn Network>, version: CacheVersion, manifest: Vec<Url>,
    ) -> Self {
        Self { store, network, version, manifest, state: RwLock::new(LifecycleState::Idle) }
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    pub fn version(&self) -> &CacheVersion {
        &self.version
    }

    /// Populate the static cache with every manifest URL.
    ///
    /// All URLs are fetched before anything is written, and the batch is
    /// stored atomically. Any unreachable URL or non-ok status fails the
    /// whole install and leaves the store untouched.
    ///
    /// On an active lifecycle this refreshes the precache and stays active
    /// whether or not the refresh succeeds.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let refreshing = {
            let mut state = self.state.write().await;
            match *state {
                LifecycleState::Installing | LifecycleState::Activating => {
                    return Err(Error::InvalidState { expected: "idle".into(), actual: state.to_string() });
                }
                LifecycleState::Active => true,
                _ => {
                    *state = LifecycleState::Installing;
                    false
                }
            }
        };
        tracing::info!(version = self.version.version(), refreshing, "installing");

        let result = self.precache().await;
        match &result {
            Ok(report) => tracing::info!(cache = %report.cache, cached = report.cached, "installation complete"),
            Err(e) => tracing::warn!(version = self.version.version(), "install failed: {e}"),
        }
        if !refreshing {
            *self.state.write().await =
                if result.is_ok() { LifecycleState::Installed } else { LifecycleState::Redundant };
        }
        result
    }

    async fn precache(&self) -> Result<InstallReport, Error> {
        let mut entries = Vec::with_capacity(self.manifest.len());
        for url in &self.manifest {
            let request = ProxyRequest::get(url.clone());
            let response = self
                .network
                .fetch(&request)
                .await
                .map_err(|e| Error::InstallFailed { url: url.to_string(), reason: e.to_string() })?;
            if !response.is_ok() {
                return Err(Error::InstallFailed {
                    url: url.to_string(),
                    reason: format!("status {}", response.status.as_u16()),
                });
            }
            entries.push((request.cache_key(), response.to_stored()));
        }

        let name = self.version.name(CacheName::StaticAssets);
        let cache = CacheHandle::open(self.store.as_ref(), &name).await?;
        cache.put_all(&entries).await?;

        Ok(InstallReport { cache: name, cached: entries.len(), skip_waiting: true })
    }

    /// Delete every cache not owned by this version, then claim clients.
    ///
    /// The sweep finishes before the claim, so no intercepted request can see
    /// a half-deleted cache.
    pub async fn activate(&self, clients: &dyn ClientSignals) -> Result<ActivateReport, Error> {
        {
            let mut state = self.state.write().await;
            if *state != LifecycleState::Installed {
                return Err(Error::InvalidState { expected: "installed".into(), actual: state.to_string() });
            }
            *state = LifecycleState::Activating;
        }
        tracing::info!(version = self.version.version(), "activating");

        let deleted = match self.sweep().await {
            Ok(deleted) => deleted,
            Err(e) => {
                *self.state.write().await = LifecycleState::Installed;
                return Err(e);
            }
        };

        clients.claim().await;
        *self.state.write().await = LifecycleState::Active;
        tracing::info!(deleted = deleted.len(), "activation complete");

        Ok(ActivateReport { deleted })
    }

    async fn sweep(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.store.names().await? {
            if !self.version.is_current(&name) {
                tracing::info!(cache = %name, "deleting old cache");
                self.store.delete(&name).await?;
                deleted.push(name);
            }
        }
        Ok(deleted)
    }
}
