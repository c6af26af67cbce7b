//! Transport abstraction for the dealer's line protocol.
//!
//! The [`Transport`] trait is a bidirectional channel of text lines between
//! the client and the dealer. Byte-stream transports must reassemble lines
//! themselves, since a socket read may end in the middle of a line or carry
//! several lines at once; [`LineBuffer`] does that work for the built-in
//! transports.
//!
//! # Connection Setup
//!
//! Opening a connection is the job of a [`Connector`]. The client keeps the
//! connector for the whole session and calls it again after every connection
//! loss, which is what makes automatic reconnection possible.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use blackjack_client::error::BlackjackError;
//! use blackjack_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, line: String) -> Result<(), BlackjackError> {
//!         // Write `line` followed by the newline delimiter
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, BlackjackError>> {
//!         // Return the next complete line without its delimiter,
//!         // or None when the connection is closed cleanly
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), BlackjackError> {
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::{BlackjackError, Result};

/// Largest line the built-in transports buffer before giving up on the peer.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// A bidirectional text line transport to the dealer.
///
/// Each call to [`send`](Transport::send) transmits one line (the transport
/// appends the delimiter). Each call to [`recv`](Transport::recv) returns one
/// complete line without its delimiter.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because the session task
/// polls it inside `tokio::select!`. Cancelling a pending `recv` must not lose
/// any bytes already read from the peer.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one line to the dealer.
    ///
    /// # Errors
    ///
    /// Returns [`BlackjackError::TransportSend`] or
    /// [`BlackjackError::TransportClosed`] if the line could not be written.
    async fn send(&mut self, line: String) -> Result<()>;

    /// Receive the next line from the dealer.
    ///
    /// Returns:
    /// - `Some(Ok(line))`: a complete line was received
    /// - `Some(Err(e))`: the transport failed
    /// - `None`: the dealer closed the connection
    async fn recv(&mut self) -> Option<Result<String>>;

    /// Close the connection. Must be idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown handshake fails. Resources are
    /// released regardless.
    async fn close(&mut self) -> Result<()>;
}

/// Opens connections to a fixed dealer endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport produced by a successful connect.
    type Transport: Transport;

    /// Open a new connection.
    ///
    /// # Errors
    ///
    /// Returns [`BlackjackError::Io`] or [`BlackjackError::Timeout`] when the
    /// endpoint cannot be reached.
    async fn connect(&self) -> Result<Self::Transport>;
}

/// Reassembles newline-delimited lines from arbitrary chunks of bytes.
///
/// ```
/// use blackjack_client::transport::LineBuffer;
///
/// let mut buffer = LineBuffer::new();
/// buffer.extend(b"OK you:1").unwrap();
/// assert_eq!(buffer.next_line(), None);
///
/// buffer.extend(b"7 10\xE2\x99\xA0 7\xE2\x99\xA5\r\nWIN\n").unwrap();
/// assert_eq!(buffer.next_line().as_deref(), Some("OK you:17 10♠ 7♥"));
/// assert_eq!(buffer.next_line().as_deref(), Some("WIN"));
/// assert_eq!(buffer.next_line(), None);
/// ```
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    ///
    /// # Errors
    ///
    /// Returns [`BlackjackError::LineTooLong`] if the unterminated tail grows
    /// beyond [`MAX_LINE_LENGTH`]. The buffer is cleared in that case.
    pub fn extend(&mut self, bytes: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(bytes);
        let tail = match self.pending.iter().rposition(|b| *b == b'\n') {
            Some(pos) => self.pending.len() - pos - 1,
            None => self.pending.len(),
        };
        if tail > MAX_LINE_LENGTH {
            self.pending.clear();
            return Err(BlackjackError::LineTooLong {
                limit: MAX_LINE_LENGTH,
            });
        }
        Ok(())
    }

    /// Pop the next complete line, without its `\n` or `\r\n` delimiter.
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Bytes received after the last delimiter.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Discard the unterminated tail, returning it if non-empty.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}
