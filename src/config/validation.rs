//! Configuration validation logic.

use std::path::PathBuf;

use super::ServerConfig;
use crate::utils::url_validation::{validate_http_url, validate_websocket_url};

/// Validate a merged configuration.
///
/// # Errors
/// Returns a message naming the offending setting.
pub(super) fn validate(config: &ServerConfig) -> Result<(), String> {
    if config.port == 0 {
        return Err("Server port must be greater than 0".to_string());
    }

    validate_http_url(&config.upstream_session_url)
        .map_err(|e| format!("Invalid upstream session_url: {e}"))?;

    let connect_url = config.upstream_connect_url.trim();
    if !connect_url.is_empty() {
        validate_websocket_url(connect_url)
            .map_err(|e| format!("Invalid upstream connect_url: {e}"))?;
    }

    if !config.upstream_interrupt_frame.is_object() {
        return Err("upstream interrupt_frame must be a JSON object".to_string());
    }
    for (action, frame) in &config.upstream_control_actions {
        if !frame.is_object() {
            return Err(format!(
                "upstream control action '{action}' must map to a JSON object"
            ));
        }
    }

    require_positive(
        "upstream connect_timeout_seconds",
        config.upstream_connect_timeout_seconds,
    )?;
    require_positive(
        "upstream request_timeout_seconds",
        config.upstream_request_timeout_seconds,
    )?;
    require_positive("session ttl_seconds", config.session_ttl_seconds)?;
    require_positive("session max_entries", config.session_max_entries)?;

    if config.rate_limit_requests_per_second == 0 {
        return Err("rate_limit_requests_per_second must be greater than 0".to_string());
    }
    if config.rate_limit_burst_size == 0 {
        return Err("rate_limit_burst_size must be greater than 0".to_string());
    }

    Ok(())
}

/// Reject TLS configurations where only one of the two paths is set.
pub(super) fn validate_tls_paths(
    cert_path: Option<&PathBuf>,
    key_path: Option<&PathBuf>,
) -> Result<(), String> {
    match (cert_path, key_path) {
        (Some(_), None) => Err("TLS certificate path is set but key path is missing".to_string()),
        (None, Some(_)) => Err("TLS key path is set but certificate path is missing".to_string()),
        _ => Ok(()),
    }
}

fn require_positive(name: &str, value: u64) -> Result<(), String> {
    if value == 0 {
        Err(format!("{name} must be greater than 0"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_port_zero() {
        let mut config = ServerConfig::default();
        config.port = 0;
        assert!(validate(&config).unwrap_err().contains("port"));
    }

    #[test]
    fn test_rejects_zero_ttl_and_capacity() {
        let mut config = ServerConfig::default();
        config.session_ttl_seconds = 0;
        assert!(validate(&config).unwrap_err().contains("ttl_seconds"));

        let mut config = ServerConfig::default();
        config.session_max_entries = 0;
        assert!(validate(&config).unwrap_err().contains("max_entries"));
    }

    #[test]
    fn test_rejects_zero_timeouts() {
        let mut config = ServerConfig::default();
        config.upstream_connect_timeout_seconds = 0;
        assert!(validate(&config).unwrap_err().contains("connect_timeout"));

        let mut config = ServerConfig::default();
        config.upstream_request_timeout_seconds = 0;
        assert!(validate(&config).unwrap_err().contains("request_timeout"));
    }

    #[test]
    fn test_rejects_bad_urls() {
        let mut config = ServerConfig::default();
        config.upstream_session_url = "wss://api.openai.com/v1/realtime/sessions".to_string();
        assert!(validate(&config).unwrap_err().contains("session_url"));

        let mut config = ServerConfig::default();
        config.upstream_connect_url = "https://api.openai.com/v1/realtime".to_string();
        assert!(validate(&config).unwrap_err().contains("connect_url"));
    }

    #[test]
    fn test_empty_connect_url_is_allowed() {
        let mut config = ServerConfig::default();
        config.upstream_connect_url = String::new();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_rejects_non_object_frames() {
        let mut config = ServerConfig::default();
        config.upstream_interrupt_frame = json!("response.cancel");
        assert!(validate(&config).unwrap_err().contains("interrupt_frame"));

        let mut config = ServerConfig::default();
        config
            .upstream_control_actions
            .insert("clear".to_string(), json!([1, 2]));
        assert!(validate(&config).unwrap_err().contains("clear"));
    }

    #[test]
    fn test_validate_tls_paths() {
        let cert = PathBuf::from("/tmp/cert.pem");
        let key = PathBuf::from("/tmp/key.pem");
        assert!(validate_tls_paths(Some(&cert), Some(&key)).is_ok());
        assert!(validate_tls_paths(None, None).is_ok());
        assert!(validate_tls_paths(Some(&cert), None).is_err());
        assert!(validate_tls_paths(None, Some(&key)).is_err());
    }
}
