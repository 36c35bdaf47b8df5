//! HTTP and WebSocket request handlers
//!
//! This module organizes all API handlers into logical groups:
//! - `api` - Health check endpoint
//! - `session` - Upstream session creation
//! - `relay` - Client WebSocket relayed to the upstream session

pub mod api;
pub mod relay;
pub mod session;

// Re-export commonly used handlers for convenient access
pub use relay::relay_handler;
pub use session::create_session;
