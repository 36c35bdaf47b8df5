//! Client to upstream WebSocket relay.
//!
//! [`RelayBridge`] owns establishment and teardown. Frames move through two
//! pumps, one per direction; client text frames pass through the
//! [`ControlTranslator`] on their way upstream.

pub mod bridge;
pub mod frame;
pub mod messages;
pub mod pump;
pub mod translator;
pub mod upstream;

pub use bridge::{BridgeOutcome, BridgeSettings, BridgeSummary, ConnectionState, RelayBridge};
pub use frame::{StructuredFrame, UpstreamFrame};
pub use messages::ProxyMessage;
pub use pump::{DirectionStats, PumpExit, Side};
pub use translator::{ControlTranslator, default_interrupt_frame};
pub use upstream::{UpstreamConnector, UpstreamSocket, WebSocketConnector, connect_with_timeout};
