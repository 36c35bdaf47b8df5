//! Session creation endpoint.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::errors::RelayResult;
use crate::state::AppState;

/// Query parameters accepted by `GET /session`.
#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    /// Model identifier overriding the configured one
    pub model: Option<String>,
}

/// Successful `GET /session` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub ok: bool,
    /// Identifier to pass as `sessionId` when opening `/ws`
    pub session_id: String,
    /// Upstream session-creation response, verbatim
    pub remote_session: Value,
}

/// Create an upstream session and register it for relaying.
///
/// # Returns
/// * `200 {"ok":true,"sessionId":…,"remoteSession":…}` on success
/// * `500 {"error":…,"details":…[,"status":…]}` when the upstream call fails
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> RelayResult<Json<SessionResponse>> {
    let session = state.initiator.create_session(query.model.as_deref()).await?;

    info!(session_id = %session.id, "Session issued to client");

    Ok(Json(SessionResponse {
        ok: true,
        session_id: session.id.clone(),
        remote_session: session.upstream_connect_params.as_value().clone(),
    }))
}
