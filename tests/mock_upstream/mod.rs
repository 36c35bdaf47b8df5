//! Mock realtime upstream
//!
//! A plain `ws://` server standing in for the realtime speech service:
//! - Records the handshake (path, bearer credential, beta header)
//! - Reports every frame it receives, and its own close, as [`UpstreamEvent`]s
//! - Sends whatever the test pushes through [`MockUpstream::send`]

// Not every test binary uses every helper
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// What the mock saw during one WebSocket handshake.
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    pub path_and_query: String,
    pub authorization: Option<String>,
    pub beta: Option<String>,
}

/// Something that happened on an upstream connection.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    Frame(Message),
    Closed,
}

pub struct MockUpstream {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    handshakes: Arc<Mutex<Vec<Handshake>>>,
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<UpstreamEvent>>,
    outbound: mpsc::UnboundedSender<Message>,
}

struct Shared {
    connections: Arc<AtomicUsize>,
    handshakes: Arc<Mutex<Vec<Handshake>>>,
    events: mpsc::UnboundedSender<UpstreamEvent>,
    outbound: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Message>>>,
}

impl MockUpstream {
    /// Bind on an ephemeral localhost port and start accepting.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let connections = Arc::new(AtomicUsize::new(0));
        let handshakes = Arc::new(Mutex::new(Vec::new()));

        let shared = Arc::new(Shared {
            connections: connections.clone(),
            handshakes: handshakes.clone(),
            events: events_tx,
            outbound: Arc::new(tokio::sync::Mutex::new(outbound_rx)),
        });

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle_connection(stream, shared.clone()));
            }
        });

        Self {
            addr,
            connections,
            handshakes,
            events: tokio::sync::Mutex::new(events_rx),
            outbound: outbound_tx,
        }
    }

    /// `ws://` address of the mock.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/v1/realtime", self.addr)
    }

    /// Number of WebSocket handshakes completed so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn handshakes(&self) -> Vec<Handshake> {
        self.handshakes.lock().unwrap().clone()
    }

    /// Queue a frame for the connected relay.
    pub fn send(&self, message: Message) {
        self.outbound.send(message).unwrap();
    }

    /// Next event, failing the test after five seconds.
    pub async fn next_event(&self) -> UpstreamEvent {
        let mut events = self.events.lock().await;
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for upstream event")
            .expect("mock upstream event channel closed")
    }

    /// Next data frame received from the relay.
    pub async fn next_frame(&self) -> Message {
        match self.next_event().await {
            UpstreamEvent::Frame(message) => message,
            UpstreamEvent::Closed => panic!("upstream closed while waiting for a frame"),
        }
    }

    /// Wait until the relay side of the connection goes away.
    pub async fn wait_closed(&self) {
        loop {
            if self.next_event().await == UpstreamEvent::Closed {
                return;
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, shared: Arc<Shared>) {
    let handshakes = shared.handshakes.clone();
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default();
        handshakes.lock().unwrap().push(Handshake {
            path_and_query,
            authorization: header("authorization"),
            beta: header("openai-beta"),
        });
        Ok(response)
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("Mock upstream handshake failed: {e}");
            return;
        }
    };
    shared.connections.fetch_add(1, Ordering::SeqCst);

    let (mut write, mut read) = ws_stream.split();

    let outbound = shared.outbound.clone();
    let writer = tokio::spawn(async move {
        let mut outbound = outbound.lock().await;
        while let Some(message) = outbound.recv().await {
            let is_close = matches!(message, Message::Close(_));
            if write.send(message).await.is_err() || is_close {
                break;
            }
        }
    });

    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Close(_)) => break,
            Ok(message @ (Message::Text(_) | Message::Binary(_))) => {
                let _ = shared.events.send(UpstreamEvent::Frame(message));
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }

    writer.abort();
    let _ = shared.events.send(UpstreamEvent::Closed);
}
