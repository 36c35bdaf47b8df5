//! Relay socket admission.
//!
//! Every `/ws` upgrade takes one slot from a global pool and one from the
//! caller's per-address pool before the handler runs. The slot travels with
//! the request as a [`ConnectionSlot`] extension and is returned when the
//! relay connection ends.
//!
//! ```ignore
//! let relay = relay::create_relay_router().layer(axum::middleware::from_fn_with_state(
//!     state.clone(),
//!     connection_limit_middleware,
//! ));
//! ```

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode, header::UPGRADE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::state::{AppState, ConnectionLimitError};

/// A held relay connection slot.
///
/// Clones share the slot; it goes back to the pool with the last clone.
#[derive(Clone, Debug)]
pub struct ConnectionSlot(Arc<SlotGuard>);

#[derive(Debug)]
struct SlotGuard {
    state: Arc<AppState>,
    ip: IpAddr,
}

impl ConnectionSlot {
    /// Take a slot for `ip`, or report which pool is exhausted.
    pub fn acquire(state: Arc<AppState>, ip: IpAddr) -> Result<Self, ConnectionLimitError> {
        state.try_acquire_connection(ip)?;
        Ok(Self(Arc::new(SlotGuard { state, ip })))
    }

    pub fn ip(&self) -> IpAddr {
        self.0.ip
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.state.release_connection(self.ip);
        debug!(ip = %self.ip, "Connection slot released");
    }
}

impl IntoResponse for ConnectionLimitError {
    fn into_response(self) -> Response {
        match self {
            ConnectionLimitError::GlobalLimitReached => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Relay at capacity, retry later.",
            ),
            ConnectionLimitError::PerIpLimitReached => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many relay connections from this address.",
            ),
        }
        .into_response()
    }
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Admit or refuse a relay upgrade.
///
/// Plain HTTP requests pass straight through. Upgrades over the global limit
/// get `503`, over the per-address limit `429`.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !is_websocket_upgrade(request.headers()) {
        return next.run(request).await;
    }

    match ConnectionSlot::acquire(state, addr.ip()) {
        Ok(slot) => {
            request.extensions_mut().insert(slot);
            next.run(request).await
        }
        Err(limit) => {
            warn!(ip = %addr.ip(), reason = ?limit, "Relay connection refused");
            limit.into_response()
        }
    }
}
