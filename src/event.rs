//! Events emitted by the client to its consumer.
//!
//! A renderer drives its view entirely from these: every received line yields
//! an [`ClientEvent::Update`] carrying the classified line and the resulting
//! [`GameState`] snapshot, and every connection change yields a
//! [`ClientEvent::PhaseChanged`].

use std::time::Duration;

use crate::client::ConnectionPhase;
use crate::error::CommandRejection;
use crate::protocol::{ClientCommand, ProtocolEvent};
use crate::state::GameState;

/// Events produced by [`BlackjackClient`](crate::BlackjackClient).
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ClientEvent {
    /// The connection moved to a new phase.
    PhaseChanged {
        /// The phase just entered.
        phase: ConnectionPhase,
    },

    /// A transport to the dealer was opened.
    Connected,

    /// A line was received and folded into the game state.
    Update {
        /// The line's classification.
        event: ProtocolEvent,
        /// Game state after the line was applied.
        state: Box<GameState>,
    },

    /// A command or `new_round` changed the state before the dealer answered.
    LocalUpdate {
        /// Game state after the optimistic change.
        state: Box<GameState>,
    },

    /// The gate refused the command because another one is still in flight,
    /// or there was no connection to send it on. Re-issue it once the client
    /// is ready for input again.
    CommandDropped {
        /// The command that was not sent.
        command: ClientCommand,
    },

    /// The command is not valid in the current game state and was not sent.
    CommandRejected {
        /// The refused command.
        command: ClientCommand,
        /// Why it was refused.
        reason: CommandRejection,
    },

    /// The dealer refused the login. Credentials were discarded.
    LoginRejected {
        /// The dealer's error line.
        message: String,
    },

    /// The connection was lost or closed.
    Disconnected {
        /// Human-readable reason, if one is known.
        reason: Option<String>,
    },

    /// Credentials are held, so a new connection attempt follows after `delay`.
    ReconnectScheduled {
        /// Time until the next attempt.
        delay: Duration,
    },

    /// Disconnected without credentials; the user has to log in.
    LoginRequired,
}
