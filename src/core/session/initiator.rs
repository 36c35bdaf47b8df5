//! Upstream session creation.
//!
//! One POST to the upstream session endpoint per client request. The response
//! body is registered verbatim; the relay never interprets it beyond what
//! [`UpstreamConnectParams`] extracts at bridge time.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use super::params::UpstreamConnectParams;
use super::registry::{Session, SessionRegistry};
use crate::config::ServerConfig;
use crate::errors::{RelayError, RelayResult};

/// Maximum number of upstream error-body bytes echoed back to clients.
const MAX_ERROR_BODY_LEN: usize = 4096;

/// Settings the initiator needs from the server configuration.
#[derive(Clone)]
pub struct SessionInitiatorConfig {
    pub session_url: String,
    pub api_key: Option<Zeroizing<String>>,
    pub model: String,
    pub instructions: String,
    pub voice: Option<String>,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for SessionInitiatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInitiatorConfig")
            .field("session_url", &self.session_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl From<&ServerConfig> for SessionInitiatorConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            session_url: config.upstream_session_url.clone(),
            api_key: config
                .upstream_api_key
                .clone()
                .map(Zeroizing::new),
            model: config.upstream_model.clone(),
            instructions: config.upstream_instructions.clone(),
            voice: config.upstream_voice.clone(),
            request_timeout: Duration::from_secs(config.upstream_request_timeout_seconds),
        }
    }
}

/// Request body sent to the upstream session endpoint.
#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'a str>,
}

/// Performs the session handshake and registers the result.
#[derive(Clone)]
pub struct SessionInitiator {
    client: reqwest::Client,
    config: SessionInitiatorConfig,
    registry: SessionRegistry,
}

impl SessionInitiator {
    pub fn new(config: SessionInitiatorConfig, registry: SessionRegistry) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            config,
            registry,
        }
    }

    /// Create an upstream session and register it.
    ///
    /// # Arguments
    /// * `model_override` - Model identifier to request instead of the configured one
    ///
    /// # Errors
    /// * `MissingUpstreamCredential` - no API key configured
    /// * `SessionRequestFailed` - the request did not complete
    /// * `UpstreamSessionCreationFailed` - non-2xx response, status and body echoed
    /// * `InvalidSessionResponse` - 2xx response whose body is not JSON
    ///
    /// No session is registered on any error path.
    pub async fn create_session(&self, model_override: Option<&str>) -> RelayResult<Arc<Session>> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or(RelayError::MissingUpstreamCredential)?;

        let model = model_override
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.config.model.as_str());

        let body = CreateSessionRequest {
            model,
            instructions: &self.config.instructions,
            voice: self.config.voice.as_deref(),
        };

        info!(model = %model, "Creating upstream session");

        let response = self
            .client
            .post(&self.config.session_url)
            .bearer_auth(api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Upstream session request failed: {}", e);
                RelayError::SessionRequestFailed(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RelayError::SessionRequestFailed(e.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Upstream session creation rejected");
            return Err(RelayError::UpstreamSessionCreationFailed {
                status: status.as_u16(),
                body: truncate_body(text),
            });
        }

        let remote: Value = serde_json::from_str(&text).map_err(|e| {
            error!("Upstream session response is not JSON: {}", e);
            RelayError::InvalidSessionResponse(e.to_string())
        })?;

        let session_id = uuid::Uuid::new_v4().to_string();
        let session = self
            .registry
            .put(session_id, UpstreamConnectParams::new(remote))
            .await;

        info!(session_id = %session.id, "Upstream session registered");
        Ok(session)
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY_LEN {
        let mut cut = MAX_ERROR_BODY_LEN;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn initiator_for(server_uri: &str, api_key: Option<&str>) -> (SessionInitiator, SessionRegistry) {
        let registry = SessionRegistry::new(Duration::from_secs(60), 100);
        let config = SessionInitiatorConfig {
            session_url: format!("{server_uri}/v1/realtime/sessions"),
            api_key: api_key.map(|k| Zeroizing::new(k.to_string())),
            model: "gpt-4o-realtime-preview".to_string(),
            instructions: "You are a concise voice assistant.".to_string(),
            voice: Some("alloy".to_string()),
            request_timeout: Duration::from_secs(5),
        };
        (SessionInitiator::new(config, registry.clone()), registry)
    }

    #[tokio::test]
    async fn test_create_session_registers_response_verbatim() {
        let server = MockServer::start().await;
        let remote = json!({
            "id": "sess_remote_1",
            "model": "gpt-4o-realtime-preview",
            "client_secret": {"value": "ek_abc", "expires_at": 1700000000}
        });
        Mock::given(method("POST"))
            .and(path("/v1/realtime/sessions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-realtime-preview",
                "instructions": "You are a concise voice assistant.",
                "voice": "alloy"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(remote.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let (initiator, registry) = initiator_for(&server.uri(), Some("sk-test"));
        let session = initiator.create_session(None).await.unwrap();

        assert!(!session.id.is_empty());
        let stored = registry.get(&session.id).await.unwrap();
        assert_eq!(stored.upstream_connect_params.as_value(), &remote);
    }

    #[tokio::test]
    async fn test_model_override_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini-realtime-preview"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "s"})))
            .expect(1)
            .mount(&server)
            .await;

        let (initiator, _) = initiator_for(&server.uri(), Some("sk-test"));
        assert!(
            initiator
                .create_session(Some("gpt-4o-mini-realtime-preview"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_non_success_surfaces_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let (initiator, registry) = initiator_for(&server.uri(), Some("sk-bad"));
        let err = initiator.create_session(None).await.unwrap_err();

        match err {
            RelayError::UpstreamSessionCreationFailed { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid api key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(registry.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_api_key_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (initiator, _) = initiator_for(&server.uri(), None);
        let err = initiator.create_session(None).await.unwrap_err();
        assert!(matches!(err, RelayError::MissingUpstreamCredential));
    }

    #[tokio::test]
    async fn test_non_json_success_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let (initiator, registry) = initiator_for(&server.uri(), Some("sk-test"));
        let err = initiator.create_session(None).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidSessionResponse(_)));
        assert_eq!(registry.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let (initiator, _) = initiator_for("http://127.0.0.1:1", Some("sk-test"));
        let err = initiator.create_session(None).await.unwrap_err();
        assert!(matches!(err, RelayError::SessionRequestFailed(_)));
    }

    #[test]
    fn test_truncate_body_respects_char_boundary() {
        let body = "é".repeat(MAX_ERROR_BODY_LEN);
        let truncated = truncate_body(body);
        assert!(truncated.len() <= MAX_ERROR_BODY_LEN);
        assert!(truncated.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = SessionInitiatorConfig {
            session_url: "https://example.com".to_string(),
            api_key: Some(Zeroizing::new("sk-secret".to_string())),
            model: "m".to_string(),
            instructions: "i".to_string(),
            voice: None,
            request_timeout: Duration::from_secs(1),
        };
        assert!(!format!("{config:?}").contains("sk-secret"));
    }
}
