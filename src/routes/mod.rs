//! Route configuration
//!
//! - `api` - Session creation REST endpoint
//! - `relay` - Relay WebSocket endpoint

pub mod api;
pub mod relay;

use std::sync::Arc;

use axum::{Router, middleware, routing::get};

use crate::handlers::api::health_check;
use crate::middleware::connection_limit_middleware;
use crate::state::AppState;

/// Assemble every route of the relay with its state.
///
/// The WebSocket routes sit behind the connection-limit middleware, which
/// requires the service to be built with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn create_app_router(app_state: Arc<AppState>) -> Router {
    let relay_routes = relay::create_relay_router().layer(middleware::from_fn_with_state(
        app_state.clone(),
        connection_limit_middleware,
    ));

    Router::new()
        .route("/", get(health_check))
        .merge(api::create_api_router())
        .merge(relay_routes)
        .with_state(app_state)
}
