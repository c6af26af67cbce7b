//! Error types for the blackjack client.

use thiserror::Error;

/// Errors that can occur when talking to the dealer.
#[derive(Debug, Error)]
pub enum BlackjackError {
    /// Failed to send a line through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a line from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// The peer sent more than `limit` bytes without a line delimiter.
    #[error("line exceeds {limit} bytes without a delimiter")]
    LineTooLong {
        /// Maximum number of bytes buffered for a single line.
        limit: usize,
    },

    /// The client's background session task is no longer running.
    #[error("client is not running")]
    NotConnected,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for blackjack client operations.
pub type Result<T> = std::result::Result<T, BlackjackError>;

/// Why a user command was refused locally before reaching the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandRejection {
    /// The command is not valid in the current round.
    #[error("not allowed while the round is {0}")]
    WrongRound(crate::state::Round),

    /// Bets must be strictly positive.
    #[error("bet amount must be greater than zero")]
    InvalidAmount,

    /// The player cannot cover the stake.
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance {
        /// Amount the command would debit.
        needed: u32,
        /// Balance currently held.
        available: u32,
    },

    /// Game commands require an accepted login.
    #[error("not logged in")]
    NotLoggedIn,

    /// Credentials must be non-blank single words to fit on one protocol line.
    #[error("username and password must be non-empty and contain no whitespace")]
    InvalidCredentials,
}
