//! Transport implementations for the dealer's line protocol.
//!
//! This module provides concrete [`Transport`](crate::Transport) and
//! [`Connector`](crate::Connector) implementations behind feature gates.
//! Enable the corresponding Cargo feature to pull in a transport:
//!
//! | Feature                | Connector               | Transport                  |
//! |------------------------|-------------------------|----------------------------|
//! | `transport-tcp`        | [`TcpConnector`]        | [`TcpLineTransport`]       |
//! | `transport-websocket`  | [`WebSocketConnector`]  | [`WebSocketLineTransport`] |
//!
//! # Example
//!
//! ```rust,ignore
//! # async fn example() -> Result<(), blackjack_client::BlackjackError> {
//! use blackjack_client::{Connector, TcpConnector, Transport};
//!
//! let mut tcp = TcpConnector::new("127.0.0.1:4000").connect().await?;
//! tcp.send("STATUS".to_string()).await?;
//!
//! if let Some(Ok(line)) = tcp.recv().await {
//!     println!("dealer said: {line}");
//! }
//!
//! tcp.close().await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "transport-tcp")]
pub mod tcp;

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-tcp")]
pub use tcp::{TcpConnector, TcpLineTransport};

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketConnector, WebSocketLineTransport};
