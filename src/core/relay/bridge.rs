//! Relay bridge: establishment, steady-state pumping and teardown.
//!
//! One bridge per client WebSocket. Establishment resolves the session and
//! opens the upstream; every failure there becomes a single client error
//! frame followed by a close. Once both sides are open, two pumps run as
//! independent tasks and the first one to finish tears the bridge down.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::Message as ClientMessage;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::select;
use tokio::task::JoinError;
use tokio_tungstenite::tungstenite::{self, Message as UpstreamMessage};
use tracing::{info, warn};
use zeroize::Zeroizing;

use super::messages::ProxyMessage;
use super::pump::{DirectionStats, PumpExit, Side, pump_client, pump_upstream};
use super::translator::ControlTranslator;
use super::upstream::{UpstreamConnector, UpstreamSocket, connect_with_timeout};
use crate::config::ServerConfig;
use crate::core::session::{Session, SessionRegistry, TargetDefaults};
use crate::errors::{RelayError, RelayResult};

/// Lifecycle of one side of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// Settings the bridge takes from the server configuration.
#[derive(Clone)]
pub struct BridgeSettings {
    /// Base upstream WebSocket URL for sessions without an explicit address
    pub connect_url: Option<String>,
    pub model: String,
    pub api_key: Option<Zeroizing<String>>,
    pub connect_timeout: Duration,
    /// Claim the session so only one client can pair with it
    pub single_use: bool,
}

impl fmt::Debug for BridgeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeSettings")
            .field("connect_url", &self.connect_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .field("single_use", &self.single_use)
            .finish()
    }
}

impl From<&ServerConfig> for BridgeSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            connect_url: Some(config.upstream_connect_url.trim())
                .filter(|url| !url.is_empty())
                .map(str::to_string),
            model: config.upstream_model.clone(),
            api_key: config.upstream_api_key.clone().map(Zeroizing::new),
            connect_timeout: Duration::from_secs(config.upstream_connect_timeout_seconds),
            single_use: config.session_single_use,
        }
    }
}

/// Counters and teardown cause of a finished bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSummary {
    pub session_id: String,
    pub client_to_upstream_frames: u64,
    pub client_to_upstream_bytes: u64,
    pub upstream_to_client_frames: u64,
    pub upstream_to_client_bytes: u64,
    /// Side whose termination started teardown
    pub initiator: Side,
    pub reason: PumpExit,
    pub duration: Duration,
}

impl BridgeSummary {
    /// Summary of a bridge that closed before any frame was relayed.
    fn idle(session_id: &str, reason: PumpExit, started: Instant) -> Self {
        Self {
            session_id: session_id.to_string(),
            client_to_upstream_frames: 0,
            client_to_upstream_bytes: 0,
            upstream_to_client_frames: 0,
            upstream_to_client_bytes: 0,
            initiator: Side::Client,
            reason,
            duration: started.elapsed(),
        }
    }

    fn log(&self) {
        info!(
            session_id = %self.session_id,
            initiator = %self.initiator,
            reason = %self.reason,
            client_to_upstream_frames = self.client_to_upstream_frames,
            client_to_upstream_bytes = self.client_to_upstream_bytes,
            upstream_to_client_frames = self.upstream_to_client_frames,
            upstream_to_client_bytes = self.upstream_to_client_bytes,
            duration_ms = self.duration.as_millis() as u64,
            "Relay bridge closed"
        );
    }
}

/// How a bridge ended.
#[derive(Debug)]
pub enum BridgeOutcome {
    /// Establishment failed; the client got an error frame and was closed
    Rejected(RelayError),
    /// Frames were relayed until one side terminated
    Completed(BridgeSummary),
}

/// Connects clients to the upstream sessions they were issued.
#[derive(Clone)]
pub struct RelayBridge {
    registry: SessionRegistry,
    connector: Arc<dyn UpstreamConnector>,
    translator: Arc<ControlTranslator>,
    settings: BridgeSettings,
}

impl RelayBridge {
    pub fn new(
        registry: SessionRegistry,
        connector: Arc<dyn UpstreamConnector>,
        translator: Arc<ControlTranslator>,
        settings: BridgeSettings,
    ) -> Self {
        Self {
            registry,
            connector,
            translator,
            settings,
        }
    }

    /// Run a bridge for `session_id` over an upgraded client connection.
    ///
    /// Returns once both sides are closed. Never fails: every error is
    /// reported to the client and reflected in the outcome.
    pub async fn run<S>(&self, session_id: Option<&str>, client: S) -> BridgeOutcome
    where
        S: Stream<Item = Result<ClientMessage, axum::Error>>
            + Sink<ClientMessage>
            + Unpin
            + Send
            + 'static,
        <S as Sink<ClientMessage>>::Error: fmt::Display + Send,
    {
        let (mut client_tx, client_rx) = client.split();
        info!(session_id = ?session_id, client = %ConnectionState::Open, "Relay connection opened");

        let (session, upstream) = match self.establish(session_id).await {
            Ok(established) => established,
            Err(e) => {
                warn!(session_id = ?session_id, error = %e, "Relay establishment failed");
                let notice = ProxyMessage::error(e.to_string());
                let _ = client_tx
                    .send(ClientMessage::Text(notice.to_json().into()))
                    .await;
                let _ = client_tx.close().await;
                info!(session_id = ?session_id, client = %ConnectionState::Closed, "Relay connection closed");
                return BridgeOutcome::Rejected(e);
            }
        };

        let started = Instant::now();
        let (mut upstream_tx, upstream_rx) = upstream.split();

        let ready = ProxyMessage::ProxyReady.to_json();
        if let Err(e) = client_tx.send(ClientMessage::Text(ready.into())).await {
            warn!(session_id = %session.id, "Failed to send proxy_ready: {}", e);
            let _ = upstream_tx.close().await;
            let summary = BridgeSummary::idle(&session.id, PumpExit::Error(e.to_string()), started);
            summary.log();
            return BridgeOutcome::Completed(summary);
        }

        let summary = self
            .pump(&session, started, client_tx, client_rx, upstream_tx, upstream_rx)
            .await;
        summary.log();
        BridgeOutcome::Completed(summary)
    }

    /// Resolve the session and open its upstream connection.
    ///
    /// A single-use session is claimed before connecting and put back if
    /// the upstream cannot be opened, so concurrent clients presenting the
    /// same id never both get through.
    async fn establish(
        &self,
        session_id: Option<&str>,
    ) -> RelayResult<(Arc<Session>, UpstreamSocket)> {
        let Some(id) = session_id else {
            return Err(RelayError::InvalidOrExpiredSession);
        };

        if !self.settings.single_use {
            let session = self
                .registry
                .get(id)
                .await
                .ok_or(RelayError::InvalidOrExpiredSession)?;
            let socket = self.open_upstream(&session).await?;
            return Ok((session, socket));
        }

        let session = self
            .registry
            .take(id)
            .await
            .ok_or(RelayError::InvalidOrExpiredSession)?;
        match self.open_upstream(&session).await {
            Ok(socket) => Ok((session, socket)),
            Err(e) => {
                self.registry.restore(session).await;
                Err(e)
            }
        }
    }

    async fn open_upstream(&self, session: &Session) -> RelayResult<UpstreamSocket> {
        let defaults = TargetDefaults {
            connect_url: self.settings.connect_url.as_deref(),
            model: &self.settings.model,
            api_key: self.settings.api_key.as_deref().map(String::as_str),
        };
        let target = session.upstream_connect_params.resolve_target(&defaults)?;

        info!(
            session_id = %session.id,
            url = %target.url,
            upstream = %ConnectionState::Connecting,
            "Opening upstream connection"
        );
        let socket = connect_with_timeout(
            self.connector.as_ref(),
            &target,
            self.settings.connect_timeout,
        )
        .await?;
        info!(session_id = %session.id, upstream = %ConnectionState::Open, "Upstream connection open");

        Ok(socket)
    }

    /// Run both pumps until one finishes, then stop the other.
    async fn pump<CT, CR, UT, UR>(
        &self,
        session: &Session,
        started: Instant,
        client_tx: CT,
        client_rx: CR,
        upstream_tx: UT,
        upstream_rx: UR,
    ) -> BridgeSummary
    where
        CT: Sink<ClientMessage> + Unpin + Send + 'static,
        CT::Error: fmt::Display + Send,
        CR: Stream<Item = Result<ClientMessage, axum::Error>> + Unpin + Send + 'static,
        UT: Sink<UpstreamMessage> + Unpin + Send + 'static,
        UT::Error: fmt::Display + Send,
        UR: Stream<Item = Result<UpstreamMessage, tungstenite::Error>> + Unpin + Send + 'static,
    {
        let downstream = Arc::new(DirectionStats::default());
        let upstream = Arc::new(DirectionStats::default());

        let mut upstream_task = tokio::spawn(pump_upstream(upstream_rx, client_tx, downstream.clone()));
        let mut client_task = tokio::spawn(pump_client(
            client_rx,
            upstream_tx,
            self.translator.clone(),
            upstream.clone(),
        ));

        let (initiator, reason) = select! {
            result = &mut upstream_task => {
                client_task.abort();
                (Side::Upstream, exit_of(result))
            }
            result = &mut client_task => {
                upstream_task.abort();
                (Side::Client, exit_of(result))
            }
        };

        info!(
            session_id = %session.id,
            initiator = %initiator,
            client = %ConnectionState::Closed,
            upstream = %ConnectionState::Closed,
            "Relay bridge torn down"
        );

        BridgeSummary {
            session_id: session.id.clone(),
            client_to_upstream_frames: upstream.frames(),
            client_to_upstream_bytes: upstream.bytes(),
            upstream_to_client_frames: downstream.frames(),
            upstream_to_client_bytes: downstream.bytes(),
            initiator,
            reason,
            duration: started.elapsed(),
        }
    }
}

fn exit_of(result: Result<PumpExit, JoinError>) -> PumpExit {
    result.unwrap_or_else(|e| PumpExit::Error(format!("pump task failed: {e}")))
}
