//! Messages the relay itself sends to clients.
//!
//! Everything else a client receives is an upstream frame forwarded verbatim.

use serde::Serialize;

/// Relay-originated client message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProxyMessage {
    /// Upstream is connected; sent before any forwarded frame
    ProxyReady,
    /// Establishment failure or upstream error
    Error { message: String },
}

impl ProxyMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ProxyMessage::Error {
            message: message.into(),
        }
    }

    /// JSON text for the wire.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| match self {
            ProxyMessage::ProxyReady => r#"{"type":"proxy_ready"}"#.to_string(),
            ProxyMessage::Error { .. } => r#"{"type":"error"}"#.to_string(),
        })
    }
}
