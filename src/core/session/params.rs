//! Upstream connection parameters.
//!
//! The upstream session-creation response is kept verbatim. The relay only
//! needs two things out of it: a WebSocket address and a bearer credential.
//! Both are derived lazily at bridge time so the stored document stays an
//! exact copy of what the upstream returned.

use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::errors::{RelayError, RelayResult};
use crate::utils::url_validation::validate_websocket_url;

/// Top-level fields checked, in order, for an explicit WebSocket address.
const ADDRESS_FIELDS: [&str; 4] = ["url", "ws_url", "websocket_url", "connect_url"];

/// Top-level string fields checked, in order, for a bearer credential.
const TOKEN_FIELDS: [&str; 2] = ["token", "access_token"];

/// Opaque bag of fields returned by the upstream session-creation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UpstreamConnectParams(Value);

/// Where and how to open the upstream WebSocket for one session.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    pub url: Url,
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for UpstreamTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamTarget")
            .field("url", &self.url.as_str())
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Fallbacks applied when the session response does not carry its own
/// address or credential.
#[derive(Debug, Clone, Default)]
pub struct TargetDefaults<'a> {
    /// Base WebSocket URL; `?model=<model>` is appended
    pub connect_url: Option<&'a str>,
    /// Model used with `connect_url` when the response has no `model` field
    pub model: &'a str,
    /// Long-lived API key used when the response has no ephemeral credential
    pub api_key: Option<&'a str>,
}

impl UpstreamConnectParams {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The stored upstream response.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Explicit WebSocket address carried by the response, if any.
    pub fn explicit_address(&self) -> Option<&str> {
        ADDRESS_FIELDS.iter().find_map(|key| self.str_field(key))
    }

    /// Per-session credential carried by the response, if any.
    ///
    /// Accepts `client_secret.value`, a plain `client_secret` string, `token`
    /// and `access_token`.
    pub fn session_credential(&self) -> Option<&str> {
        let client_secret = match self.0.get("client_secret") {
            Some(Value::Object(secret)) => secret.get("value").and_then(Value::as_str),
            Some(Value::String(secret)) => Some(secret.as_str()),
            _ => None,
        }
        .map(str::trim)
        .filter(|s| !s.is_empty());

        client_secret.or_else(|| TOKEN_FIELDS.iter().find_map(|key| self.str_field(key)))
    }

    /// Resolve the upstream target for a bridge.
    ///
    /// # Errors
    /// `MissingUpstreamAddress` when neither the response nor the defaults
    /// produce a valid `ws`/`wss` URL.
    pub fn resolve_target(&self, defaults: &TargetDefaults<'_>) -> RelayResult<UpstreamTarget> {
        let url = match self.explicit_address() {
            Some(address) => validate_websocket_url(address).map_err(|e| {
                tracing::warn!("Upstream session address rejected: {}", e);
                RelayError::MissingUpstreamAddress
            })?,
            None => {
                let base = defaults
                    .connect_url
                    .ok_or(RelayError::MissingUpstreamAddress)?;
                let mut url = validate_websocket_url(base)
                    .map_err(|_| RelayError::MissingUpstreamAddress)?;
                let model = self.str_field("model").unwrap_or(defaults.model);
                if !model.is_empty() {
                    url.query_pairs_mut().append_pair("model", model);
                }
                url
            }
        };

        let bearer_token = self
            .session_credential()
            .or(defaults.api_key)
            .map(str::to_string);

        Ok(UpstreamTarget { url, bearer_token })
    }
}

impl From<Value> for UpstreamConnectParams {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
