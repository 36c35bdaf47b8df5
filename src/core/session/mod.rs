//! Session creation and lookup.
//!
//! A session is the result of a one-time handshake with the upstream service.
//! [`SessionInitiator`] performs the handshake, [`SessionRegistry`] keeps the
//! result until the relay bridge consumes it or it expires.

pub mod initiator;
pub mod params;
pub mod registry;

pub use initiator::{SessionInitiator, SessionInitiatorConfig};
pub use params::{TargetDefaults, UpstreamConnectParams, UpstreamTarget};
pub use registry::{Session, SessionRegistry};
