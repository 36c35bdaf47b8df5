//! Error taxonomy for session creation and relay bridging.
//!
//! Errors raised while creating a session surface to HTTP clients through
//! [`IntoResponse`]. Errors raised while bridging never leave the bridge: they
//! are turned into a client error frame or a connection close.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Errors that can occur while creating sessions or relaying frames.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The upstream session-creation endpoint answered with a non-success status
    #[error("Upstream session creation failed with status {status}: {body}")]
    UpstreamSessionCreationFailed { status: u16, body: String },

    /// The session-creation request never produced a response
    #[error("Upstream session request failed: {0}")]
    SessionRequestFailed(String),

    /// The upstream answered 2xx but the body is not a JSON document
    #[error("Invalid upstream session response: {0}")]
    InvalidSessionResponse(String),

    /// No upstream API key is configured
    #[error("Upstream API key is not configured")]
    MissingUpstreamCredential,

    /// Unknown, expired or already consumed session identifier
    #[error("Invalid sessionId or session expired")]
    InvalidOrExpiredSession,

    /// Session parameters do not yield a connectable ws/wss address
    #[error("Session has no upstream address")]
    MissingUpstreamAddress,

    /// Opening or using the upstream WebSocket failed
    #[error("Upstream connection failed: {0}")]
    UpstreamConnectionError(String),

    /// A single frame could not be forwarded
    #[error("Failed to forward frame: {0}")]
    ForwardingError(String),
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

impl RelayError {
    /// Upstream HTTP status associated with the error, when there is one.
    fn upstream_status(&self) -> Option<u16> {
        match self {
            RelayError::UpstreamSessionCreationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short, client-facing summary used as the `error` field.
    fn summary(&self) -> &'static str {
        match self {
            RelayError::UpstreamSessionCreationFailed { .. }
            | RelayError::SessionRequestFailed(_)
            | RelayError::InvalidSessionResponse(_) => "Failed to create upstream session",
            RelayError::MissingUpstreamCredential => "Upstream credential not configured",
            RelayError::InvalidOrExpiredSession => "Invalid sessionId or session expired",
            RelayError::MissingUpstreamAddress => "Session has no upstream address",
            RelayError::UpstreamConnectionError(_) => "Upstream connection failed",
            RelayError::ForwardingError(_) => "Failed to forward frame",
        }
    }

    /// Detail text echoed to the client as `details`.
    fn details(&self) -> String {
        match self {
            RelayError::UpstreamSessionCreationFailed { body, .. } => body.clone(),
            RelayError::SessionRequestFailed(msg)
            | RelayError::InvalidSessionResponse(msg)
            | RelayError::UpstreamConnectionError(msg)
            | RelayError::ForwardingError(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.summary(),
            "details": self.details(),
        });
        if let Some(status) = self.upstream_status() {
            body["status"] = json!(status);
        }

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_session_message_matches_client_contract() {
        assert_eq!(
            RelayError::InvalidOrExpiredSession.to_string(),
            "Invalid sessionId or session expired"
        );
    }

    #[test]
    fn test_upstream_status_only_for_creation_failure() {
        let err = RelayError::UpstreamSessionCreationFailed {
            status: 401,
            body: "unauthorized".to_string(),
        };
        assert_eq!(err.upstream_status(), Some(401));
        assert_eq!(RelayError::MissingUpstreamAddress.upstream_status(), None);
    }

    #[tokio::test]
    async fn test_creation_failure_response_echoes_status_and_body() {
        let err = RelayError::UpstreamSessionCreationFailed {
            status: 403,
            body: r#"{"error":"forbidden"}"#.to_string(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Failed to create upstream session");
        assert_eq!(json["details"], r#"{"error":"forbidden"}"#);
        assert_eq!(json["status"], 403);
    }

    #[tokio::test]
    async fn test_missing_credential_response_has_no_status() {
        let response = RelayError::MissingUpstreamCredential.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json.get("status").is_none());
        assert_eq!(json["details"], "Upstream API key is not configured");
    }
}
