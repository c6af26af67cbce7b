//! # Blackjack Client
//!
//! Async Rust client for a blackjack dealer that speaks a newline-delimited
//! text protocol over a persistent connection.
//!
//! The crate turns the dealer's free-form lines into typed
//! [`ProtocolEvent`]s, folds them into a [`GameState`] a renderer can draw
//! directly, and manages the connection lifecycle: login, a single-slot
//! command gate, a `STATUS` keepalive and automatic reconnection.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement [`Transport`] and [`Connector`] for any backend
//! - **TCP built-in**: the default `transport-tcp` feature provides [`TcpConnector`]
//! - **WebSocket built-in**: the default `transport-websocket` feature provides
//!   [`WebSocketConnector`]
//! - **Event-driven**: receive typed [`ClientEvent`]s via a channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "transport-tcp")]
//! # async fn example() -> Result<(), blackjack_client::BlackjackError> {
//! use blackjack_client::{BlackjackClient, ClientConfig, ClientEvent, TcpConnector};
//!
//! let connector = TcpConnector::new("127.0.0.1:4000");
//! let (mut client, mut events) = BlackjackClient::start(connector, ClientConfig::default());
//!
//! client.login("alice", "secret")?;
//!
//! while let Some(event) = events.recv().await {
//!     if let ClientEvent::Update { state, .. } = event {
//!         println!("{}: balance {}", state.round, state.player.balance);
//!         if client.is_ready_for_input() && state.round == blackjack_client::Round::Betting {
//!             client.bet(10)?;
//!         }
//!     }
//! }
//!
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod card;
pub mod client;
pub mod error;
pub mod event;
pub mod gate;
pub mod protocol;
pub mod state;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use card::{card_value, is_card};
pub use client::{BlackjackClient, ClientConfig, ConnectionPhase};
pub use error::{BlackjackError, CommandRejection};
pub use event::ClientEvent;
pub use gate::CommandGate;
pub use protocol::{parse, ClientCommand, Outcome, ProtocolEvent, AWAITING_INPUT};
pub use state::{reduce, DealerState, GameState, PlayerState, Round};
pub use transport::{Connector, LineBuffer, Transport};

#[cfg(feature = "transport-tcp")]
pub use transports::{TcpConnector, TcpLineTransport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketLineTransport};
