//! Shared application state.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tracing::info;

use crate::config::ServerConfig;
use crate::core::relay::{
    BridgeSettings, ControlTranslator, RelayBridge, UpstreamConnector, WebSocketConnector,
};
use crate::core::session::{SessionInitiator, SessionInitiatorConfig, SessionRegistry};

/// Maximum size of a single upstream WebSocket message (10 MB)
pub const MAX_UPSTREAM_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Reason a WebSocket connection slot could not be acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLimitError {
    GlobalLimitReached,
    PerIpLimitReached,
}

/// Application state shared by every handler.
pub struct AppState {
    pub config: ServerConfig,
    /// Sessions awaiting (or past) their relay connection
    pub sessions: SessionRegistry,
    pub initiator: SessionInitiator,
    pub bridge: RelayBridge,

    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, u32>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("address", &self.config.address())
            .field("ws_connections", &self.ws_connection_count())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Build the state with the default upstream connector.
    pub async fn new(config: ServerConfig) -> Arc<Self> {
        let connector = Arc::new(WebSocketConnector::new(
            config.upstream_beta_header.clone(),
            MAX_UPSTREAM_MESSAGE_SIZE,
        ));
        Self::with_connector(config, connector).await
    }

    /// Build the state with a custom upstream connector.
    pub async fn with_connector(
        config: ServerConfig,
        connector: Arc<dyn UpstreamConnector>,
    ) -> Arc<Self> {
        let sessions = SessionRegistry::new(
            Duration::from_secs(config.session_ttl_seconds),
            config.session_max_entries,
        );
        let initiator =
            SessionInitiator::new(SessionInitiatorConfig::from(&config), sessions.clone());
        let translator = Arc::new(ControlTranslator::from_parts(
            &config.upstream_interrupt_frame,
            &config.upstream_control_actions,
        ));
        let bridge = RelayBridge::new(
            sessions.clone(),
            connector,
            translator,
            BridgeSettings::from(&config),
        );

        info!(
            session_ttl_seconds = config.session_ttl_seconds,
            session_max_entries = config.session_max_entries,
            single_use = config.session_single_use,
            "Application state initialized"
        );

        Arc::new(Self {
            config,
            sessions,
            initiator,
            bridge,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Reserve a WebSocket connection slot for `ip`.
    ///
    /// Every successful call must be paired with [`AppState::release_connection`].
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        let max_global = self.config.max_websocket_connections;
        let reserved = self
            .ws_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| match max_global {
                Some(max) if current >= max => None,
                _ => Some(current + 1),
            });
        if reserved.is_err() {
            return Err(ConnectionLimitError::GlobalLimitReached);
        }

        let max_per_ip = self.config.max_connections_per_ip;
        let mut entry = self.ip_connections.entry(ip).or_insert(0);
        if *entry >= max_per_ip {
            drop(entry);
            self.ws_connections.fetch_sub(1, Ordering::AcqRel);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *entry += 1;

        Ok(())
    }

    /// Release a slot previously acquired for `ip`.
    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });

        self.ip_connections.remove_if_mut(&ip, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
    }

    /// Number of open WebSocket connections.
    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::Acquire)
    }

    /// Number of open WebSocket connections from `ip`.
    pub fn ip_connection_count(&self, ip: &IpAddr) -> u32 {
        self.ip_connections.get(ip).map(|count| *count).unwrap_or(0)
    }
}
