//! Relay configuration
//!
//! Settings come from three layers, lowest first: built-in defaults, process
//! environment (which `main` seeds from `.env`), and an optional YAML file.
//! The merged result is validated once before the server starts.
//!
//! ```rust,no_run
//! use waav_relay::config::ServerConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//! assert!(config.session_ttl_seconds > 0);
//!
//! let config = ServerConfig::from_file(&"relay.yaml".into())?;
//! println!("relay on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::Value;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

/// Default upstream session-creation endpoint
pub const DEFAULT_SESSION_URL: &str = "https://api.openai.com/v1/realtime/sessions";
/// Default upstream WebSocket endpoint for sessions without an explicit address
pub const DEFAULT_CONNECT_URL: &str = "wss://api.openai.com/v1/realtime";
/// Default realtime model
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview";
/// Default system instruction sent with every session request
pub const DEFAULT_INSTRUCTIONS: &str = "You are a friendly voice assistant. Keep answers short \
     and conversational, and stay within the assistant's domain.";
/// Default `OpenAI-Beta` header value
pub const DEFAULT_BETA_HEADER: &str = "realtime=v1";

/// PEM certificate and key served on both `/session` and `/ws`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Everything the relay reads at startup.
///
/// Secrets are zeroized on drop, so build variants with field assignment on a
/// `ServerConfig::default()` rather than struct update syntax.
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsConfig>,

    /// Long-lived API key used to create upstream sessions
    pub upstream_api_key: Option<String>,
    /// Session-creation endpoint (http/https)
    pub upstream_session_url: String,
    /// WebSocket endpoint used when a session response carries no address
    pub upstream_connect_url: String,
    pub upstream_model: String,
    /// System instruction sent with every session request
    pub upstream_instructions: String,
    pub upstream_voice: Option<String>,
    /// `OpenAI-Beta` header sent on the upstream WebSocket handshake
    pub upstream_beta_header: Option<String>,
    /// Upstream frame emitted for a client `stop` control frame
    pub upstream_interrupt_frame: Value,
    /// Additional client control actions mapped to upstream frames
    pub upstream_control_actions: HashMap<String, Value>,
    pub upstream_connect_timeout_seconds: u64,
    pub upstream_request_timeout_seconds: u64,

    /// Lifetime of a registered session, counted from creation
    pub session_ttl_seconds: u64,
    pub session_max_entries: u64,
    /// Let each session pair with at most one upstream connection
    pub session_single_use: bool,

    /// `"*"` or a comma-separated origin list; unset keeps same-origin
    pub cors_allowed_origins: Option<String>,
    /// Per-client request rate; 100000 and above turns the limiter off
    pub rate_limit_requests_per_second: u32,
    pub rate_limit_burst_size: u32,
    /// Relay sockets open at once across all clients; `None` is unbounded
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            tls: None,
            upstream_api_key: None,
            upstream_session_url: DEFAULT_SESSION_URL.to_string(),
            upstream_connect_url: DEFAULT_CONNECT_URL.to_string(),
            upstream_model: DEFAULT_MODEL.to_string(),
            upstream_instructions: DEFAULT_INSTRUCTIONS.to_string(),
            upstream_voice: None,
            upstream_beta_header: Some(DEFAULT_BETA_HEADER.to_string()),
            upstream_interrupt_frame: crate::core::relay::default_interrupt_frame(),
            upstream_control_actions: HashMap::new(),
            upstream_connect_timeout_seconds: 10,
            upstream_request_timeout_seconds: 15,
            session_ttl_seconds: 300,
            session_max_entries: 10_000,
            session_single_use: true,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("address", &self.address())
            .field("tls", &self.tls)
            .field("upstream_api_key", &self.upstream_api_key.as_ref().map(|_| "<redacted>"))
            .field("upstream_session_url", &self.upstream_session_url)
            .field("upstream_connect_url", &self.upstream_connect_url)
            .field("upstream_model", &self.upstream_model)
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("session_single_use", &self.session_single_use)
            .finish_non_exhaustive()
    }
}

impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.upstream_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Missing variables fall back to defaults. The `.env` file is loaded
    /// into the environment by `main` before this is called.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or the resulting
    /// configuration fails validation.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load the environment layer, then apply the YAML file at `path` on top.
    ///
    /// Keys absent from the file keep their environment or default value.
    ///
    /// # Errors
    /// Unreadable or malformed YAML, a malformed environment variable, or a
    /// merged configuration that fails validation.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// `host:port` to bind.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Whether a non-blank upstream API key is set.
    pub fn has_upstream_api_key(&self) -> bool {
        self.upstream_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}
