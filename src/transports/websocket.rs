//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! For dealers that sit behind a WebSocket bridge. Each text frame carries
//! one or more protocol lines; a frame's end terminates its last line even
//! without a trailing `\n`. Both `ws://` and `wss://` URLs are supported and
//! TLS is handled transparently via
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! # Feature gate
//!
//! This module is only available when the `transport-websocket` feature is
//! enabled (it is enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), blackjack_client::BlackjackError> {
//! use blackjack_client::{Connector, Transport, WebSocketConnector};
//!
//! let connector = WebSocketConnector::new("ws://localhost:4001/table");
//! let mut transport = connector.connect().await?;
//! transport.send("STATUS".to_string()).await?;
//!
//! if let Some(Ok(line)) = transport.recv().await {
//!     println!("received: {line}");
//! }
//!
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::{BlackjackError, Result};
use crate::transport::{Connector, LineBuffer, Transport};

/// Type alias for the underlying WebSocket stream.
///
/// Made public so that callers can construct a [`WebSocketLineTransport`]
/// from an existing stream via [`WebSocketLineTransport::from_stream`].
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] implementation backed by a WebSocket connection.
///
/// Outgoing lines are sent as one text frame each. Incoming text frames are
/// split on `\n`, so a bridge may batch several lines per frame.
///
/// For advanced use-cases (custom TLS, proxy, headers) construct the stream
/// yourself and use [`WebSocketLineTransport::from_stream`].
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method is cancel-safe. Lines split out of a
/// frame wait in the transport's [`LineBuffer`] until they are returned.
#[derive(Debug)]
pub struct WebSocketLineTransport {
    stream: WsStream,
    buffer: LineBuffer,
    closed: bool,
}

impl WebSocketLineTransport {
    /// Establish a new WebSocket connection to the given URL.
    ///
    /// # Errors
    ///
    /// Returns [`BlackjackError::Io`] if the URL is invalid or the connection
    /// cannot be established. When the underlying error is an I/O error its
    /// [`ErrorKind`](std::io::ErrorKind) is preserved; all other errors are
    /// mapped to [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str) -> Result<Self> {
        tracing::debug!(url = %url, "connecting to WebSocket dealer");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            BlackjackError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %url, "WebSocket connection established");

        Ok(Self::from_stream(stream))
    }

    /// Create a [`WebSocketLineTransport`] from an already-established stream.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            buffer: LineBuffer::new(),
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketLineTransport {
    async fn send(&mut self, line: String) -> Result<()> {
        if self.closed {
            return Err(BlackjackError::TransportClosed);
        }
        self.stream
            .send(Message::Text(line.into()))
            .await
            .map_err(|e| BlackjackError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            if let Some(line) = self.buffer.next_line() {
                return Some(Ok(line));
            }

            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(BlackjackError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                Message::Text(text) => {
                    let mut frame = text.as_str().as_bytes().to_vec();
                    if frame.last() != Some(&b'\n') {
                        frame.push(b'\n');
                    }
                    if let Err(e) = self.buffer.extend(&frame) {
                        tracing::warn!(error = %e, "dropping oversized frame");
                        return Some(Err(e));
                    }
                }
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    return None;
                }
                Message::Ping(_) => {
                    // tungstenite auto-queues a Pong reply.
                    tracing::debug!("received WebSocket ping");
                }
                Message::Pong(_) => {
                    tracing::debug!("received WebSocket pong (ignored)");
                }
                Message::Binary(_) => {
                    tracing::warn!("received unexpected binary WebSocket frame, skipping");
                }
                Message::Frame(_) => {
                    // Never produced by the read half; kept for exhaustiveness.
                    tracing::debug!("received raw WebSocket frame, skipping");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| BlackjackError::TransportSend(e.to_string()))
    }
}

/// Opens [`WebSocketLineTransport`]s to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    /// Create a connector for `url`, e.g. `"ws://127.0.0.1:4001"`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The URL this connector dials.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketLineTransport;

    async fn connect(&self) -> Result<WebSocketLineTransport> {
        WebSocketLineTransport::connect(&self.url).await
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketLineTransport>();
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let result = WebSocketConnector::new("not-a-valid-url").connect().await;
        let err = result.unwrap_err();
        assert!(matches!(err, BlackjackError::Io(_)));
    }

    // ── Mock-stream helpers ──────────────────────────────────────────────

    use tokio::net::TcpListener;

    /// Start a local WebSocket server that runs `handler` on the accepted
    /// connection and returns the URL to connect to.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}")
    }

    // ── Mock-stream tests ────────────────────────────────────────────────

    #[tokio::test]
    async fn frame_end_terminates_a_line() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text("WIN".into())).await.unwrap();
            ws.send(Message::Text("PUSH\n".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketLineTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "WIN");
        assert_eq!(transport.recv().await.unwrap().unwrap(), "PUSH");
    }

    #[tokio::test]
    async fn batched_frame_yields_each_line() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text(
                "DEALER 20 K♠ Q♥\nLOSE\nAWAITING INPUT".into(),
            ))
            .await
            .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketLineTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "DEALER 20 K♠ Q♥");
        assert_eq!(transport.recv().await.unwrap().unwrap(), "LOSE");
        assert_eq!(transport.recv().await.unwrap().unwrap(), "AWAITING INPUT");
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text("OK balance:90".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketLineTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "OK balance:90");
    }

    #[tokio::test]
    async fn send_uses_one_frame_per_line() {
        let url = start_mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(format!("echo {}", text.as_str()).into()))
                    .await
                    .unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketLineTransport::connect(&url).await.unwrap();
        transport.send("BET 10".to_string()).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "echo BET 10");
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let url = start_mock_server(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketLineTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("HIT".to_string()).await.unwrap_err();
        assert!(matches!(err, BlackjackError::TransportClosed));
    }
}
