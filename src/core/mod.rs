pub mod relay;
pub mod session;

// Re-export commonly used types for convenience
pub use relay::{
    BridgeOutcome, BridgeSettings, BridgeSummary, ControlTranslator, ProxyMessage, RelayBridge,
    StructuredFrame, UpstreamConnector, UpstreamFrame, WebSocketConnector,
};

pub use session::{
    Session, SessionInitiator, SessionInitiatorConfig, SessionRegistry, UpstreamConnectParams,
    UpstreamTarget,
};
