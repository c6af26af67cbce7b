//! Plain TCP transport using tokio's `TcpStream`.
//!
//! This is the dealer's native wire: UTF-8 text, one command or status line
//! per `\n`-terminated line, no framing beyond the newline.
//!
//! # Feature gate
//!
//! This module is only available when the `transport-tcp` feature is enabled
//! (it is enabled by default).

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::{BlackjackError, Result};
use crate::transport::{Connector, LineBuffer, Transport};

/// Size of a single socket read.
const READ_CHUNK: usize = 4096;

/// A [`Transport`] over a byte stream carrying newline-delimited lines.
///
/// The stream defaults to a [`TcpStream`]; any other duplex byte stream
/// (a Unix socket, a TLS stream, an in-memory pipe) works the same way.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe. Bytes are moved into the
/// transport's own [`LineBuffer`] as soon as a read completes, so dropping a
/// pending `recv` never loses part of a line.
#[derive(Debug)]
pub struct TcpLineTransport<S = TcpStream> {
    stream: S,
    buffer: LineBuffer,
    chunk: Box<[u8]>,
    closed: bool,
    eof: bool,
}

impl<S> TcpLineTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an already-connected stream.
    pub fn from_stream(stream: S) -> Self {
        Self {
            stream,
            buffer: LineBuffer::new(),
            chunk: vec![0; READ_CHUNK].into_boxed_slice(),
            closed: false,
            eof: false,
        }
    }
}

#[async_trait]
impl<S> Transport for TcpLineTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, line: String) -> Result<()> {
        if self.closed {
            return Err(BlackjackError::TransportClosed);
        }
        let mut wire = line;
        wire.push('\n');
        self.stream
            .write_all(wire.as_bytes())
            .await
            .map_err(|e| BlackjackError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            if let Some(line) = self.buffer.next_line() {
                return Some(Ok(line));
            }
            if self.closed || self.eof {
                return None;
            }

            let read = match self.stream.read(&mut self.chunk).await {
                Ok(read) => read,
                Err(e) => return Some(Err(BlackjackError::TransportReceive(e.to_string()))),
            };

            if read == 0 {
                self.eof = true;
                // A final line without its newline is still a line.
                if let Some(rest) = self.buffer.take_remainder() {
                    debug!(bytes = rest.len(), "peer closed mid-line, delivering remainder");
                    return Some(Ok(rest));
                }
                return None;
            }

            let Some(bytes) = self.chunk.get(..read) else {
                return Some(Err(BlackjackError::TransportReceive(
                    "read past buffer".to_string(),
                )));
            };
            if let Err(e) = self.buffer.extend(bytes) {
                warn!(error = %e, "dropping oversized line");
                return Some(Err(e));
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.shutdown().await {
            Ok(()) => Ok(()),
            // The peer may already be gone.
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(BlackjackError::Io(e)),
        }
    }
}

/// Opens [`TcpLineTransport`]s to a fixed `host:port`.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    /// Create a connector for `addr`, e.g. `"127.0.0.1:4000"`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// The address this connector dials.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Transport = TcpLineTransport;

    async fn connect(&self) -> Result<TcpLineTransport> {
        debug!(addr = %self.addr, "connecting to dealer over TCP");
        let stream = TcpStream::connect(&self.addr).await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "could not disable Nagle's algorithm");
        }
        info!(addr = %self.addr, "TCP connection established");
        Ok(TcpLineTransport::from_stream(stream))
    }
}

#[cfg(test)]
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
    use tokio::net::TcpListener;

    /// Start a local dealer that runs `handler` on the accepted socket and
    /// return a connector for it.
    async fn start_mock_dealer<F, Fut>(handler: F) -> TcpConnector
    where
        F: FnOnce(TcpStream) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            handler(tcp).await;
        });

        TcpConnector::new(addr.to_string())
    }

    #[test]
    fn tcp_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<TcpLineTransport>();
    }

    #[tokio::test]
    async fn scripted_stream_reads_and_writes_lines() {
        let stream = tokio_test::io::Builder::new()
            .read("OK balance:75 dealer:K♦ you:17 10♠ 7♥\nAWAIT".as_bytes())
            .read(b"ING INPUT\n")
            .write(b"STAND\n")
            .read(b"LOSE\n")
            .build();
        let mut transport = TcpLineTransport::from_stream(stream);

        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            "OK balance:75 dealer:K♦ you:17 10♠ 7♥"
        );
        assert_eq!(transport.recv().await.unwrap().unwrap(), "AWAITING INPUT");
        transport.send("STAND".to_string()).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "LOSE");
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn read_error_is_reported() {
        let stream = tokio_test::io::Builder::new()
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut transport = TcpLineTransport::from_stream(stream);

        let err = transport.recv().await.unwrap().unwrap_err();
        assert!(matches!(err, BlackjackError::TransportReceive(_)));
    }

    #[tokio::test]
    async fn connect_fails_when_nobody_listens() {
        // Bind and drop to get a port that is very likely closed.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let err = TcpConnector::new(addr.to_string()).connect().await.unwrap_err();
        assert!(matches!(err, BlackjackError::Io(_)));
    }

    #[tokio::test]
    async fn recv_splits_coalesced_and_fragmented_lines() {
        let connector = start_mock_dealer(|mut tcp| async move {
            tcp.write_all(b"OK user:alice balance:100\nAWAIT").await.unwrap();
            tcp.flush().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            tcp.write_all(b"ING INPUT\r\n").await.unwrap();
        })
        .await;

        let mut transport = connector.connect().await.unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            "OK user:alice balance:100"
        );
        assert_eq!(transport.recv().await.unwrap().unwrap(), "AWAITING INPUT");
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn unterminated_last_line_is_delivered_on_eof() {
        let connector = start_mock_dealer(|mut tcp| async move {
            tcp.write_all(b"WIN\nPUSH").await.unwrap();
        })
        .await;

        let mut transport = connector.connect().await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "WIN");
        assert_eq!(transport.recv().await.unwrap().unwrap(), "PUSH");
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_appends_newline() {
        let (tx, rx) = tokio::sync::oneshot::channel::<String>();
        let connector = start_mock_dealer(|mut tcp| async move {
            let mut buf = vec![0u8; 64];
            let mut received = Vec::new();
            while !received.ends_with(b"\n") {
                let n = tcp.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }
            tx.send(String::from_utf8(received).unwrap()).unwrap();
        })
        .await;

        let mut transport = connector.connect().await.unwrap();
        transport.send("BET 25".to_string()).await.unwrap();
        assert_eq!(rx.await.unwrap(), "BET 25\n");
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let connector = start_mock_dealer(|mut tcp| async move {
            let mut buf = [0u8; 16];
            while tcp.read(&mut buf).await.map(|n| n > 0).unwrap_or(false) {}
        })
        .await;

        let mut transport = connector.connect().await.unwrap();
        transport.close().await.unwrap();
        // Second close is a no-op.
        transport.close().await.unwrap();

        let err = transport.send("HIT".to_string()).await.unwrap_err();
        assert!(matches!(err, BlackjackError::TransportClosed));
        assert!(transport.recv().await.is_none());
    }
}
