use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// Shape of a relay YAML file.
///
/// Every key is optional. Keys that are present win over the environment.
///
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   tls:
///     enabled: true
///     cert_path: "/etc/waav/cert.pem"
///     key_path: "/etc/waav/key.pem"
///
/// upstream:
///   api_key: "sk-..."
///   session_url: "https://api.openai.com/v1/realtime/sessions"
///   connect_url: "wss://api.openai.com/v1/realtime"
///   model: "gpt-4o-realtime-preview"
///   instructions: "You are a friendly voice assistant."
///   voice: "alloy"
///   beta_header: "realtime=v1"
///   interrupt_frame:
///     type: "response.cancel"
///   control_actions:
///     clear:
///       type: "input_audio_buffer.clear"
///   connect_timeout_seconds: 10
///   request_timeout_seconds: 15
///
/// session:
///   ttl_seconds: 300
///   max_entries: 10000
///   single_use: true
///
/// security:
///   cors_allowed_origins: "https://app.example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///   max_websocket_connections: 1000
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub upstream: Option<UpstreamYaml>,
    pub session: Option<SessionYaml>,
    pub security: Option<SecurityYaml>,
}

/// `server:` section
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// `server.tls:`; `enabled: false` switches off TLS set through the environment
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// `upstream:` section
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct UpstreamYaml {
    pub api_key: Option<String>,
    pub session_url: Option<String>,
    pub connect_url: Option<String>,
    pub model: Option<String>,
    pub instructions: Option<String>,
    pub voice: Option<String>,
    /// `OpenAI-Beta` header value; an empty string disables the header
    pub beta_header: Option<String>,
    /// Upstream frame emitted when a client sends a `stop` control frame
    pub interrupt_frame: Option<Value>,
    /// Client control action name to upstream frame
    pub control_actions: HashMap<String, Value>,
    pub connect_timeout_seconds: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub ttl_seconds: Option<u64>,
    pub max_entries: Option<u64>,
    pub single_use: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Read and parse `path`. No validation happens here.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
