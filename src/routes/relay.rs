//! Relay WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::relay::relay_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the relay WebSocket router
///
/// # Endpoint
///
/// `GET /ws?sessionId=<id>` - WebSocket upgrade bridged to the upstream session
///
/// # Protocol
///
/// The server sends `{"type":"proxy_ready"}` once the upstream is connected,
/// then relays frames in both directions. Establishment failures are reported
/// as `{"type":"error","message":"..."}` followed by a close.
///
/// # Example
///
/// ```json
/// // Server, after upgrade
/// {"type": "proxy_ready"}
///
/// // Client interrupts the current response
/// {"type": "control", "action": "stop"}
/// ```
pub fn create_relay_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(relay_handler))
        .layer(TraceLayer::new_for_http())
}
