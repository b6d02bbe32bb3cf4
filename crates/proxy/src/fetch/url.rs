//! URL normalization shared by classification and cache keys.
//!
//! Every URL the proxy sees is normalized here before it is classified or
//! hashed, so two spellings of one resource share a cache key.

use url::Url;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("URL is blank")]
    Empty,

    #[error("scheme {0:?} cannot be proxied")]
    UnsupportedScheme(String),

    #[error("malformed URL: {0}")]
    InvalidUrl(String),
}

/// Parse an absolute http(s) URL into its canonical form.
///
/// Relative references are rejected; use [`resolve`] for those.
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let input = non_blank(input)?;
    let url = Url::parse(input).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    normalize(url)
}

/// Resolve `input` against `base` and canonicalize the result.
pub fn resolve(base: &Url, input: &str) -> Result<Url, UrlError> {
    let input = non_blank(input)?;
    let url = base.join(input).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    normalize(url)
}

fn non_blank(input: &str) -> Result<&str, UrlError> {
    match input.trim() {
        "" => Err(UrlError::Empty),
        trimmed => Ok(trimmed),
    }
}

/// Lowercased host, no fragment, query untouched. Only http and https pass.
fn normalize(mut url: Url) -> Result<Url, UrlError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlError::UnsupportedScheme(url.scheme().to_string()));
    }

    if let Some(host) = url.host_str().filter(|h| h.bytes().any(|b| b.is_ascii_uppercase())) {
        let lower = host.to_ascii_lowercase();
        url.set_host(Some(&lower))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }
    url.set_fragment(None);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_url_parts() {
        let url = canonicalize("http://localhost:5000/index.html").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(5000));
    }

    #[test]
    fn test_host_is_lowercased() {
        let url = canonicalize("https://WWW.Alpha-Social.COM/api/contents").unwrap();
        assert_eq!(url.host_str(), Some("www.alpha-social.com"));
    }

    #[test]
    fn test_fragment_dropped() {
        let url = canonicalize("http://localhost:5000/#feed").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.as_str(), "http://localhost:5000/");
    }

    #[test]
    fn test_query_kept_verbatim() {
        let url = canonicalize("http://localhost:5000/api/contents?limit=20&offset=0").unwrap();
        assert_eq!(url.query(), Some("limit=20&offset=0"));
    }

    #[test]
    fn test_relative_needs_base() {
        let result = canonicalize("/index.html");
        assert!(matches!(result, Err(UrlError::InvalidUrl(_))));
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let result = canonicalize("ws://localhost:5000/socket");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_blank_input() {
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_resolve_relative() {
        let base = Url::parse("http://localhost:5000").unwrap();
        let url = resolve(&base, "/manifest.json").unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/manifest.json");
    }

    #[test]
    fn test_resolve_absolute_overrides_base() {
        let base = Url::parse("http://localhost:5000").unwrap();
        let url = resolve(&base, "https://cdn.alpha-social.com/app.js#x").unwrap();
        assert_eq!(url.as_str(), "https://cdn.alpha-social.com/app.js");
    }
}
