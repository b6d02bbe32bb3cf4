//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (ALPHA_SYNC_*)
//! 2. TOML config file (if ALPHA_SYNC_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::CacheVersion;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (ALPHA_SYNC_*, nested keys split on `__`)
/// 2. TOML config file (if ALPHA_SYNC_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding caches and pending writes.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the hosting runtime listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Origin of the client application. Relative URLs resolve against it.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Prefix shared by this application's cache names.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Deployment version tag. Bumping it supersedes every older cache.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Critical URLs cached at install.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// API URL patterns, `host[:port]/path-prefix`, with an optional `*.` host wildcard.
    #[serde(default = "default_api_patterns")]
    pub api_patterns: Vec<String>,

    /// Document served for failed navigations.
    #[serde(default = "default_fallback_document")]
    pub fallback_document: String,

    /// Path of the content-submission endpoint.
    #[serde(default = "default_submit_path")]
    pub submit_path: String,

    /// Seconds between periodic drains of the deferred write queue.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// User-Agent string for outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Texts for synthetic offline responses.
    #[serde(default)]
    pub messages: OfflineMessages,

    /// Defaults for displayed push notifications.
    #[serde(default)]
    pub notification: NotificationConfig,
}

/// Texts for synthetic offline responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineMessages {
    /// Plain-text body of the static 503.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// `error` field of the API 503 JSON body.
    #[serde(default = "default_offline_api")]
    pub offline_api: String,
}

impl Default for OfflineMessages {
    fn default() -> Self {
        Self { offline_page: default_offline_page(), offline_api: default_offline_api() }
    }
}

/// Defaults merged under every inbound push payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_notification_title")]
    pub title: String,

    #[serde(default = "default_notification_body")]
    pub body: String,

    #[serde(default = "default_icon")]
    pub icon: String,

    #[serde(default = "default_icon")]
    pub badge: String,

    /// Vibration pattern in milliseconds.
    #[serde(default = "default_vibrate")]
    pub vibrate: Vec<u32>,

    /// Window path opened by the `explore` action.
    #[serde(default = "default_root_path")]
    pub root_path: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: default_notification_title(),
            body: default_notification_body(),
            icon: default_icon(),
            badge: default_icon(),
            vibrate: default_vibrate(),
            root_path: default_root_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./alpha-sync.sqlite")
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".into()
}

fn default_origin() -> String {
    "http://localhost:5000".into()
}

fn default_cache_prefix() -> String {
    "alpha-social".into()
}

fn default_cache_version() -> String {
    "v1.0.0".into()
}

fn default_precache() -> Vec<String> {
    ["/", "/index.html", "/manifest.json", "/icon-192x192.png", "/icon-512x512.png"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_api_patterns() -> Vec<String> {
    vec!["localhost:5000/api/".into(), "*.alpha-social.com/api/".into()]
}

fn default_fallback_document() -> String {
    "/index.html".into()
}

fn default_submit_path() -> String {
    "/api/contents".into()
}

fn default_sync_interval_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "alpha-sync/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_offline_page() -> String {
    "网络连接失败".into()
}

fn default_offline_api() -> String {
    "网络连接失败，请检查网络设置".into()
}

fn default_notification_title() -> String {
    "Alpha Social".into()
}

fn default_notification_body() -> String {
    "您有新的消息".into()
}

fn default_icon() -> String {
    "/icon-192x192.png".into()
}

fn default_vibrate() -> Vec<u32> {
    vec![100, 50, 100]
}

fn default_root_path() -> String {
    "/".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            listen_addr: default_listen_addr(),
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            precache: default_precache(),
            api_patterns: default_api_patterns(),
            fallback_document: default_fallback_document(),
            submit_path: default_submit_path(),
            sync_interval_secs: default_sync_interval_secs(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            messages: OfflineMessages::default(),
            notification: NotificationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Interval between background drains.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Cache naming for the configured deployment.
    pub fn cache_version(&self) -> CacheVersion {
        CacheVersion::new(&self.cache_prefix, &self.cache_version)
    }

    /// Parsed application origin.
    pub fn origin_url(&self) -> Result<url::Url, ConfigError> {
        url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("ALPHA_SYNC_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("ALPHA_SYNC_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheName;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./alpha-sync.sqlite"));
        assert_eq!(config.origin, "http://localhost:5000");
        assert_eq!(config.precache.len(), 5);
        assert_eq!(config.precache[0], "/");
        assert_eq!(config.api_patterns.len(), 2);
        assert_eq!(config.fallback_document, "/index.html");
        assert_eq!(config.submit_path, "/api/contents");
        assert_eq!(config.notification.vibrate, vec![100, 50, 100]);
        assert_eq!(config.notification.title, "Alpha Social");
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.sync_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_cache_version_names() {
        let config = AppConfig { cache_version: "v2.0.0".into(), ..Default::default() };
        let version = config.cache_version();
        assert_eq!(version.name(CacheName::StaticAssets), "alpha-social-v2.0.0");
        assert_eq!(version.name(CacheName::Api), "alpha-social-api-v2.0.0");
    }

    #[test]
    fn test_origin_url() {
        let config = AppConfig::default();
        assert_eq!(config.origin_url().unwrap().as_str(), "http://localhost:5000/");

        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        assert!(matches!(config.origin_url(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_nested_sections_deserialize_with_defaults() {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string("[notification]\ntitle = \"Custom\"\n"))
            .extract()
            .unwrap();
        assert_eq!(config.notification.title, "Custom");
        assert_eq!(config.notification.body, "您有新的消息");
    }
}
