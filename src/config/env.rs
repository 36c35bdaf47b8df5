//! Environment variable loading.
//!
//! Variables override defaults; unset or blank variables leave the current
//! value untouched.

use std::path::PathBuf;

use super::utils::{env_var, parse_env, parse_env_bool, parse_json};
use super::validation::validate_tls_paths;
use super::{ServerConfig, TlsConfig};

/// Apply environment variables on top of `config`.
pub(super) fn apply_env(config: &mut ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Server
    if let Some(host) = env_var("HOST") {
        config.host = host;
    }
    if let Some(port) = parse_env::<u16>("PORT")? {
        config.port = port;
    }

    let cert_path = env_var("TLS_CERT_PATH").map(PathBuf::from);
    let key_path = env_var("TLS_KEY_PATH").map(PathBuf::from);
    validate_tls_paths(cert_path.as_ref(), key_path.as_ref())?;
    if let (Some(cert_path), Some(key_path)) = (cert_path, key_path) {
        config.tls = Some(TlsConfig {
            cert_path,
            key_path,
        });
    }

    // Upstream
    if let Some(key) = env_var("UPSTREAM_API_KEY").or_else(|| env_var("OPENAI_API_KEY")) {
        config.upstream_api_key = Some(key);
    }
    if let Some(url) = env_var("UPSTREAM_SESSION_URL") {
        config.upstream_session_url = url;
    }
    if let Some(url) = env_var("UPSTREAM_CONNECT_URL") {
        config.upstream_connect_url = url;
    }
    if let Some(model) = env_var("UPSTREAM_MODEL") {
        config.upstream_model = model;
    }
    if let Some(instructions) = env_var("UPSTREAM_INSTRUCTIONS") {
        config.upstream_instructions = instructions;
    }
    if let Some(voice) = env_var("UPSTREAM_VOICE") {
        config.upstream_voice = Some(voice);
    }
    if let Ok(beta) = std::env::var("UPSTREAM_BETA_HEADER") {
        let beta = beta.trim();
        config.upstream_beta_header = (!beta.is_empty()).then(|| beta.to_string());
    }
    if let Some(raw) = env_var("UPSTREAM_INTERRUPT_FRAME") {
        config.upstream_interrupt_frame = parse_json("UPSTREAM_INTERRUPT_FRAME", &raw)?;
    }
    if let Some(secs) = parse_env::<u64>("UPSTREAM_CONNECT_TIMEOUT_SECONDS")? {
        config.upstream_connect_timeout_seconds = secs;
    }
    if let Some(secs) = parse_env::<u64>("UPSTREAM_REQUEST_TIMEOUT_SECONDS")? {
        config.upstream_request_timeout_seconds = secs;
    }

    // Session registry
    if let Some(secs) = parse_env::<u64>("SESSION_TTL_SECONDS")? {
        config.session_ttl_seconds = secs;
    }
    if let Some(max) = parse_env::<u64>("SESSION_MAX_ENTRIES")? {
        config.session_max_entries = max;
    }
    if let Some(single_use) = parse_env_bool("SESSION_SINGLE_USE")? {
        config.session_single_use = single_use;
    }

    // Security
    if let Some(origins) = env_var("CORS_ALLOWED_ORIGINS") {
        config.cors_allowed_origins = Some(origins);
    }
    if let Some(rps) = parse_env::<u32>("RATE_LIMIT_REQUESTS_PER_SECOND")? {
        config.rate_limit_requests_per_second = rps;
    }
    if let Some(burst) = parse_env::<u32>("RATE_LIMIT_BURST_SIZE")? {
        config.rate_limit_burst_size = burst;
    }
    if let Some(max) = parse_env::<usize>("MAX_WEBSOCKET_CONNECTIONS")? {
        config.max_websocket_connections = Some(max);
    }
    if let Some(max) = parse_env::<u32>("MAX_CONNECTIONS_PER_IP")? {
        config.max_connections_per_ip = max;
    }

    Ok(())
}
