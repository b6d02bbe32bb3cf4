//! Versioned cache naming.

use serde::{Deserialize, Serialize};

/// The two caches the proxy owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheName {
    /// Shell documents, manifest and icons; served cache-first.
    StaticAssets,
    /// Backend responses; served network-first.
    Api,
}

/// Naming scheme for one deployment's caches.
///
/// Static cache: `{prefix}-{version}`. API cache: `{prefix}-api-{version}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheVersion {
    prefix: String,
    version: String,
}

impl CacheVersion {
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), version: version.into() }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Full store name of `cache` for this version.
    pub fn name(&self, cache: CacheName) -> String {
        match cache {
            CacheName::StaticAssets => format!("{}-{}", self.prefix, self.version),
            CacheName::Api => format!("{}-api-{}", self.prefix, self.version),
        }
    }

    /// Whether a store name belongs to this version. Everything else is stale.
    pub fn is_current(&self, name: &str) -> bool {
        name == self.name(CacheName::StaticAssets) || name == self.name(CacheName::Api)
    }
}
