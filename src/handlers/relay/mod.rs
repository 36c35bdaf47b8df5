//! Relay WebSocket handler
//!
//! `GET /ws?sessionId=<id>` upgrades to a WebSocket and bridges it to the
//! upstream session issued by `GET /session`.
//!
//! ## Server → Client
//!
//! - **proxy_ready**: Upstream connected, relaying starts
//! - **error**: Establishment failure or upstream error, followed by close
//! - Upstream text and binary frames, verbatim
//!
//! ## Client → Server
//!
//! - **Binary frames**: Audio, forwarded verbatim
//! - **control** `{"type":"control","action":"stop"}`: Interrupt the response
//! - Any other text frame, forwarded after control translation

mod handler;

pub use handler::{RelayQuery, relay_handler};
