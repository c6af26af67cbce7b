//! Single-slot flow control for outgoing commands.
//!
//! The dealer only accepts a command after it has asked for one with a line
//! containing [`AWAITING_INPUT`](crate::protocol::AWAITING_INPUT). The
//! [`CommandGate`] is the only path to the wire and guarantees that at most
//! one command is outstanding. Commands offered while a previous one is still
//! in flight are dropped, never queued; callers that need delivery must wait
//! for [`CommandGate::is_ready`] and offer the command again.

use tracing::debug;

use crate::error::Result;
use crate::protocol::{signals_ready, ClientCommand};
use crate::transport::Transport;

/// Gate allowing one outstanding command at a time.
#[derive(Debug, Clone)]
pub struct CommandGate {
    ready: bool,
    in_flight: Option<&'static str>,
}

impl CommandGate {
    /// A gate for a freshly opened connection. Nothing is outstanding yet, so
    /// the gate starts open.
    pub fn new() -> Self {
        Self {
            ready: true,
            in_flight: None,
        }
    }

    /// Returns `true` if a command may be sent now.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Keyword of the command awaiting the dealer's prompt, if any.
    pub fn in_flight(&self) -> Option<&'static str> {
        self.in_flight
    }

    /// Send `command` if the gate is open, closing it behind the command.
    ///
    /// Returns `Ok(false)` without touching the transport when a command is
    /// already in flight.
    ///
    /// # Errors
    ///
    /// Propagates the transport's send error. The gate stays closed in that
    /// case; the connection is considered lost.
    pub async fn try_send<T>(&mut self, transport: &mut T, command: &ClientCommand) -> Result<bool>
    where
        T: Transport + ?Sized,
    {
        if !self.ready {
            debug!(
                command = command.name(),
                in_flight = self.in_flight.unwrap_or("unknown"),
                "gate closed, dropping command"
            );
            return Ok(false);
        }

        self.ready = false;
        self.in_flight = Some(command.name());
        transport.send(command.to_string()).await?;
        debug!(command = command.name(), "command sent, gate closed");
        Ok(true)
    }

    /// Inspect a received line and reopen the gate if the dealer asks for
    /// input. Returns `true` if the line carried the ready marker.
    pub fn observe(&mut self, line: &str) -> bool {
        if !signals_ready(line) {
            return false;
        }
        if let Some(answered) = self.in_flight.take() {
            debug!(command = answered, "dealer ready, gate reopened");
        }
        self.ready = true;
        true
    }
}

impl Default for CommandGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::BlackjackError;
    use async_trait::async_trait;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<String>,
        fail: bool,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn send(&mut self, line: String) -> Result<()> {
            if self.fail {
                return Err(BlackjackError::TransportClosed);
            }
            self.sent.push(line);
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String>> {
            None
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn second_send_before_prompt_is_dropped() {
        let mut gate = CommandGate::new();
        let mut transport = Recorder::default();

        assert!(gate.try_send(&mut transport, &ClientCommand::Hit).await.unwrap());
        assert!(!gate.try_send(&mut transport, &ClientCommand::Stand).await.unwrap());

        assert_eq!(transport.sent, vec!["HIT".to_string()]);
        assert_eq!(gate.in_flight(), Some("HIT"));
    }

    #[tokio::test]
    async fn prompt_reopens_the_gate() {
        let mut gate = CommandGate::new();
        let mut transport = Recorder::default();

        gate.try_send(&mut transport, &ClientCommand::Hit).await.unwrap();
        assert!(!gate.observe("OK you:15 10♠ 5♣"));
        assert!(!gate.is_ready());

        assert!(gate.observe("AWAITING INPUT"));
        assert!(gate.is_ready());
        assert_eq!(gate.in_flight(), None);

        assert!(gate.try_send(&mut transport, &ClientCommand::Stand).await.unwrap());
        assert_eq!(transport.sent, vec!["HIT".to_string(), "STAND".to_string()]);
    }

    #[tokio::test]
    async fn send_error_propagates_and_keeps_gate_closed() {
        let mut gate = CommandGate::new();
        let mut transport = Recorder {
            fail: true,
            ..Recorder::default()
        };

        let result = gate.try_send(&mut transport, &ClientCommand::Status).await;
        assert!(matches!(result, Err(BlackjackError::TransportClosed)));
        assert!(!gate.is_ready());
    }

    #[test]
    fn prompt_while_idle_keeps_gate_open() {
        let mut gate = CommandGate::new();
        assert!(gate.observe("> AWAITING INPUT"));
        assert!(gate.is_ready());
    }
}
