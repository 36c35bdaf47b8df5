//! URL validation for upstream endpoints
//!
//! Upstream addresses come from two places: configuration and the body of the
//! upstream session-creation response. Both are validated before use:
//! - WebSocket targets must use `ws` or `wss`
//! - REST endpoints must use `http` or `https`
//! - Every URL must carry a host

use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be ws or wss, got: {0}")]
    WebSocketSchemeRequired(String),

    #[error("URL scheme must be http or https, got: {0}")]
    HttpSchemeRequired(String),

    #[error("URL must have a host")]
    MissingHost,
}

fn parse_with_host(raw: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(raw.trim())?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }
    Ok(url)
}

/// Validates a WebSocket URL used to reach the upstream service
///
/// # Returns
/// * `Ok(Url)` - The parsed URL
/// * `Err(UrlValidationError)` - If the URL is malformed, has no host, or is not ws/wss
pub fn validate_websocket_url(raw: &str) -> Result<Url, UrlValidationError> {
    let url = parse_with_host(raw)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(UrlValidationError::WebSocketSchemeRequired(other.to_string())),
    }
}

/// Validates an HTTP(S) URL used for upstream REST calls
pub fn validate_http_url(raw: &str) -> Result<Url, UrlValidationError> {
    let url = parse_with_host(raw)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(UrlValidationError::HttpSchemeRequired(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url_accepts_ws_and_wss() {
        assert!(validate_websocket_url("ws://127.0.0.1:9000/realtime").is_ok());
        assert!(validate_websocket_url("wss://api.openai.com/v1/realtime?model=x").is_ok());
    }

    #[test]
    fn test_websocket_url_rejects_http() {
        assert_eq!(
            validate_websocket_url("https://api.openai.com/v1/realtime"),
            Err(UrlValidationError::WebSocketSchemeRequired(
                "https".to_string()
            ))
        );
    }

    #[test]
    fn test_websocket_url_rejects_garbage() {
        assert!(matches!(
            validate_websocket_url("not a url"),
            Err(UrlValidationError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_url_without_host_rejected() {
        assert!(validate_websocket_url("ws:///path").is_err());
        assert!(validate_http_url("unix:/var/run/socket").is_err());
    }

    #[test]
    fn test_http_url_accepts_https() {
        let url = validate_http_url(" https://api.openai.com/v1/realtime/sessions ").unwrap();
        assert_eq!(url.host_str(), Some("api.openai.com"));
    }

    #[test]
    fn test_http_url_rejects_ws() {
        assert_eq!(
            validate_http_url("wss://example.com"),
            Err(UrlValidationError::HttpSchemeRequired("wss".to_string()))
        );
    }
}
