use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::session;
use crate::state::AppState;
use std::sync::Arc;

/// Create the REST API router
///
/// # Endpoints
///
/// `GET /session[?model=<id>]` - Create an upstream session and return its id
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/session", get(session::create_session))
        .layer(TraceLayer::new_for_http())
}
