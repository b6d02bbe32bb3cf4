//! Request classification.
//!
//! Maps an outgoing request to the strategy and cache partition that handle
//! it. Classification is pure: the same method and URL always produce the
//! same class for the lifetime of a [`Classifier`].

use std::str::FromStr;

use reqwest::Method;
use url::Url;

/// Which strategy handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Cache-first against the static asset cache.
    Static,
    /// Network-first against the API cache.
    Api,
    /// Not intercepted; goes straight to the network.
    Unhandled,
}

/// Error type for API pattern parsing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,

    #[error("pattern {0:?} has no path prefix")]
    MissingPath(String),

    #[error("pattern {0:?} has an invalid port")]
    InvalidPort(String),

    #[error("pattern {0:?} has an invalid host")]
    InvalidHost(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostPattern {
    Exact(String),
    /// `*.suffix`: any host ending in `.suffix`, never `suffix` itself.
    Subdomain(String),
}

impl HostPattern {
    fn matches(&self, host: &str) -> bool {
        match self {
            HostPattern::Exact(expected) => host == expected,
            HostPattern::Subdomain(suffix) => host
                .strip_suffix(suffix.as_str())
                .is_some_and(|rest| rest.len() > 1 && rest.ends_with('.')),
        }
    }
}

/// An API URL pattern: `host[:port]/path-prefix`.
///
/// Either `http` or `https` matches, and an optional scheme prefix in the
/// pattern text is ignored. Without a port the URL must use its scheme's
/// default port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPattern {
    host: HostPattern,
    port: Option<u16>,
    path_prefix: String,
}

impl FromStr for ApiPattern {
    type Err = PatternError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PatternError::Empty);
        }

        let rest = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);

        let slash = rest
            .find('/')
            .ok_or_else(|| PatternError::MissingPath(input.to_string()))?;
        let (authority, path_prefix) = rest.split_at(slash);

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| PatternError::InvalidPort(input.to_string()))?;
                (host, Some(port))
            }
            None => (authority, None),
        };

        let host = host.to_ascii_lowercase();
        let host = match host.strip_prefix("*.") {
            Some(suffix) if !suffix.is_empty() && !suffix.contains('*') => HostPattern::Subdomain(suffix.to_string()),
            None if !host.is_empty() && !host.contains('*') => HostPattern::Exact(host),
            _ => return Err(PatternError::InvalidHost(input.to_string())),
        };

        Ok(Self { host, port, path_prefix: path_prefix.to_string() })
    }
}

impl ApiPattern {
    pub fn matches(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        self.host.matches(host) && url.port() == self.port && url.path().starts_with(&self.path_prefix)
    }
}

/// Classifies requests against a fixed set of API patterns.
#[derive(Debug, Clone)]
pub struct Classifier {
    patterns: Vec<ApiPattern>,
}

impl Classifier {
    pub fn new(patterns: Vec<ApiPattern>) -> Self {
        Self { patterns }
    }

    /// Parse every configured pattern.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
        let patterns = patterns
            .iter()
            .map(|p| p.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(patterns))
    }

    pub fn is_api(&self, url: &Url) -> bool {
        self.patterns.iter().any(|p| p.matches(url))
    }

    /// API if any pattern matches, otherwise static for GET, otherwise unhandled.
    pub fn classify(&self, method: &Method, url: &Url) -> RequestClass {
        if self.is_api(url) {
            RequestClass::Api
        } else if method == Method::GET {
            RequestClass::Static
        } else {
            RequestClass::Unhandled
        }
    }
}
