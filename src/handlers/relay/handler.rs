use std::sync::Arc;

use axum::{
    Extension,
    extract::{Query, State, WebSocketUpgrade, ws::WebSocket},
    response::Response,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::core::relay::BridgeOutcome;
use crate::middleware::ConnectionSlot;
use crate::state::AppState;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Query parameters accepted by `GET /ws`.
#[derive(Debug, Default, Deserialize)]
pub struct RelayQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Relay WebSocket handler
///
/// Upgrades the HTTP connection and bridges it to the upstream session named
/// by `sessionId`. Unknown or missing ids are reported over the WebSocket, so
/// the upgrade itself always succeeds.
///
/// # Arguments
/// * `ws` - The WebSocket upgrade request from Axum
/// * `query` - `sessionId` query parameter
/// * `state` - Application state holding the relay bridge
/// * `slot` - Connection slot from the connection-limit middleware, when mounted
pub async fn relay_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<RelayQuery>,
    State(state): State<Arc<AppState>>,
    slot: Option<Extension<ConnectionSlot>>,
) -> Response {
    info!(
        session_id = ?query.session_id,
        "Relay WebSocket connection upgrade requested"
    );

    let slot = slot.map(|Extension(slot)| slot);

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_relay_socket(socket, state, query.session_id, slot))
}

/// Run the relay bridge for an upgraded connection
async fn handle_relay_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    session_id: Option<String>,
    slot: Option<ConnectionSlot>,
) {
    let outcome = state.bridge.run(session_id.as_deref(), socket).await;

    match outcome {
        BridgeOutcome::Rejected(e) => {
            debug!(session_id = ?session_id, error = %e, "Relay connection rejected");
        }
        BridgeOutcome::Completed(summary) => {
            debug!(
                session_id = %summary.session_id,
                initiator = %summary.initiator,
                "Relay connection finished"
            );
        }
    }

    // Release the connection slot only once both sides are closed
    drop(slot);
}
