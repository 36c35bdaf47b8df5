//! Per-direction frame pumps.
//!
//! Each pump reads one side and writes the other until its source terminates,
//! then closes the opposite sink. Pumps are generic over the stream and sink
//! halves so they can be driven by in-memory channels in tests.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message as ClientMessage;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message as UpstreamMessage};
use tracing::{debug, warn};

use super::frame::UpstreamFrame;
use super::messages::ProxyMessage;
use super::translator::ControlTranslator;
use crate::errors::RelayError;

/// Frame and byte counters for one direction.
#[derive(Debug, Default)]
pub struct DirectionStats {
    frames: AtomicU64,
    bytes: AtomicU64,
}

impl DirectionStats {
    fn record(&self, bytes: usize) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

/// One side of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Upstream,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Client => write!(f, "client"),
            Side::Upstream => write!(f, "upstream"),
        }
    }
}

/// Why a pump stopped reading its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpExit {
    /// Close frame received
    Closed,
    /// Stream ended without a close frame
    Ended,
    /// Transport error
    Error(String),
}

impl fmt::Display for PumpExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PumpExit::Closed => write!(f, "closed"),
            PumpExit::Ended => write!(f, "ended"),
            PumpExit::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Forward upstream frames to the client until the upstream terminates.
///
/// Binary and text frames are forwarded unchanged. An upstream error is
/// reported to the client as an error frame before the client is closed.
pub async fn pump_upstream<R, W>(
    mut upstream: R,
    mut client: W,
    stats: Arc<DirectionStats>,
) -> PumpExit
where
    R: Stream<Item = Result<UpstreamMessage, tungstenite::Error>> + Unpin,
    W: Sink<ClientMessage> + Unpin,
    W::Error: fmt::Display,
{
    let exit = loop {
        let message = match upstream.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => break PumpExit::Error(e.to_string()),
            None => break PumpExit::Ended,
        };

        let (outgoing, len) = match message {
            UpstreamMessage::Binary(data) => {
                let len = data.len();
                (ClientMessage::Binary(data), len)
            }
            UpstreamMessage::Text(text) => {
                let len = text.len();
                (ClientMessage::Text(text.as_str().into()), len)
            }
            UpstreamMessage::Close(frame) => {
                debug!(?frame, "Upstream sent close frame");
                break PumpExit::Closed;
            }
            UpstreamMessage::Ping(_) | UpstreamMessage::Pong(_) | UpstreamMessage::Frame(_) => {
                continue;
            }
        };

        match client.send(outgoing).await {
            Ok(()) => stats.record(len),
            Err(e) => warn!(
                direction = "upstream_to_client",
                bytes = len,
                "{}",
                RelayError::ForwardingError(e.to_string())
            ),
        }
    };

    if let PumpExit::Error(e) = &exit {
        let notice = ProxyMessage::error(format!("Upstream connection error: {e}"));
        let _ = client.send(ClientMessage::Text(notice.to_json().into())).await;
    }
    let _ = client.close().await;

    exit
}

/// Forward client frames to the upstream until the client terminates.
///
/// Binary frames are forwarded unchanged. Text frames pass through the
/// control translator first.
pub async fn pump_client<R, W>(
    mut client: R,
    mut upstream: W,
    translator: Arc<ControlTranslator>,
    stats: Arc<DirectionStats>,
) -> PumpExit
where
    R: Stream<Item = Result<ClientMessage, axum::Error>> + Unpin,
    W: Sink<UpstreamMessage> + Unpin,
    W::Error: fmt::Display,
{
    let exit = loop {
        let message = match client.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => break PumpExit::Error(e.to_string()),
            None => break PumpExit::Ended,
        };

        let frame = match message {
            ClientMessage::Binary(data) => UpstreamFrame::Binary(data),
            ClientMessage::Text(text) => translator.translate_text(text.as_str()),
            ClientMessage::Close(frame) => {
                debug!(?frame, "Client sent close frame");
                break PumpExit::Closed;
            }
            ClientMessage::Ping(_) | ClientMessage::Pong(_) => continue,
        };

        let len = frame.len();
        match upstream.send(frame.into()).await {
            Ok(()) => stats.record(len),
            Err(e) => warn!(
                direction = "client_to_upstream",
                bytes = len,
                "{}",
                RelayError::ForwardingError(e.to_string())
            ),
        }
    };

    let _ = upstream.close().await;

    exit
}
