//! Upstream WebSocket connector.
//!
//! The relay opens exactly one upstream connection per bridge. The connector
//! is a trait so the transport can be swapped without touching the bridge.

use std::time::Duration;

use async_trait::async_trait;
use http::HeaderValue;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::core::session::UpstreamTarget;
use crate::errors::{RelayError, RelayResult};

/// Upstream duplex connection.
pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens upstream duplex connections.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// Open a connection to `target`.
    ///
    /// # Errors
    /// `UpstreamConnectionError` when the handshake fails.
    async fn connect(&self, target: &UpstreamTarget) -> RelayResult<UpstreamSocket>;
}

/// tokio-tungstenite based connector with bearer authentication.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    /// Value of the `OpenAI-Beta` header, if any
    beta_header: Option<String>,
    /// Maximum size of a single upstream message
    max_message_size: usize,
}

impl WebSocketConnector {
    pub fn new(beta_header: Option<String>, max_message_size: usize) -> Self {
        Self {
            beta_header,
            max_message_size,
        }
    }
}

#[async_trait]
impl UpstreamConnector for WebSocketConnector {
    async fn connect(&self, target: &UpstreamTarget) -> RelayResult<UpstreamSocket> {
        let mut request = target
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| RelayError::UpstreamConnectionError(e.to_string()))?;

        let headers = request.headers_mut();
        if let Some(token) = &target.bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| RelayError::UpstreamConnectionError(e.to_string()))?;
            headers.insert(http::header::AUTHORIZATION, value);
        }
        if let Some(beta) = &self.beta_header {
            let value = HeaderValue::from_str(beta)
                .map_err(|e| RelayError::UpstreamConnectionError(e.to_string()))?;
            headers.insert("openai-beta", value);
        }

        let ws_config = WebSocketConfig::default()
            .max_message_size(Some(self.max_message_size))
            .max_frame_size(Some(self.max_message_size));

        let (socket, response) =
            tokio_tungstenite::connect_async_with_config(request, Some(ws_config), false)
                .await
                .map_err(|e| RelayError::UpstreamConnectionError(e.to_string()))?;

        tracing::debug!(
            url = %target.url,
            status = %response.status(),
            "Upstream WebSocket handshake complete"
        );

        Ok(socket)
    }
}

/// Open `target` through `connector`, failing after `timeout`.
pub async fn connect_with_timeout(
    connector: &dyn UpstreamConnector,
    target: &UpstreamTarget,
    timeout: Duration,
) -> RelayResult<UpstreamSocket> {
    match tokio::time::timeout(timeout, connector.connect(target)).await {
        Ok(result) => result,
        Err(_) => Err(RelayError::UpstreamConnectionError(format!(
            "timed out after {}s",
            timeout.as_secs_f32()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    fn target(url: &str, token: Option<&str>) -> UpstreamTarget {
        UpstreamTarget {
            url: url::Url::parse(url).unwrap(),
            bearer_token: token.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_connect_sends_bearer_and_beta_headers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (headers_tx, headers_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut headers_tx = Some(headers_tx);
            let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let auth = req
                    .headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let beta = req
                    .headers()
                    .get("openai-beta")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                if let Some(tx) = headers_tx.take() {
                    let _ = tx.send((auth, beta));
                }
                Ok(resp)
            };
            let _ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let connector = WebSocketConnector::new(Some("realtime=v1".to_string()), 1024 * 1024);
        let socket = connector
            .connect(&target(&format!("ws://{addr}/"), Some("ek_123")))
            .await;
        assert!(socket.is_ok());

        let (auth, beta) = headers_rx.await.unwrap();
        assert_eq!(auth.as_deref(), Some("Bearer ek_123"));
        assert_eq!(beta.as_deref(), Some("realtime=v1"));
    }

    #[tokio::test]
    async fn test_connect_refused_is_upstream_error() {
        let connector = WebSocketConnector::new(None, 1024);
        let result = connector.connect(&target("ws://127.0.0.1:1/", None)).await;
        assert!(matches!(result, Err(RelayError::UpstreamConnectionError(_))));
    }

    struct HangingConnector {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl UpstreamConnector for HangingConnector {
        async fn connect(&self, _target: &UpstreamTarget) -> RelayResult<UpstreamSocket> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_connect_with_timeout_expires() {
        let calls = Arc::new(AtomicUsize::new(0));
        let connector = HangingConnector {
            calls: calls.clone(),
        };
        let result = connect_with_timeout(
            &connector,
            &target("ws://127.0.0.1:9/", None),
            Duration::from_millis(50),
        )
        .await;

        match result {
            Err(RelayError::UpstreamConnectionError(msg)) => assert!(msg.contains("timed out")),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
