//! # Loopback Dealer Example
//!
//! Shows how to implement the [`Transport`] and [`Connector`] traits with an
//! in-process channel pair, and plays two scripted rounds against a toy
//! dealer task on the other end. This is useful for:
//!
//! - **Testing**: exercise your renderer without a real dealer
//! - **Custom backends**: adapt any I/O layer the same way
//!
//! ## Running
//!
//! ```sh
//! cargo run --example loopback_dealer
//! ```

use async_trait::async_trait;
use blackjack_client::{
    BlackjackClient, BlackjackError, ClientConfig, ClientEvent, Connector, Round, Transport,
};
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: A channel-based "loopback" transport
// ─────────────────────────────────────────────────────────────────────

/// The client half of a loopback connection.
pub struct LoopbackTransport {
    /// Lines the client sends go here (the dealer reads the other end).
    tx: mpsc::UnboundedSender<String>,
    /// Lines the dealer sends arrive here.
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, line: String) -> Result<(), BlackjackError> {
        self.tx
            .send(line)
            .map_err(|e| BlackjackError::TransportSend(e.to_string()))
    }

    /// Cancel-safe because `mpsc::UnboundedReceiver::recv` is cancel-safe.
    /// Returns `None` once the dealer task drops its sender.
    async fn recv(&mut self) -> Option<Result<String, BlackjackError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), BlackjackError> {
        self.rx.close();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: A connector that starts a dealer task per connection
// ─────────────────────────────────────────────────────────────────────

struct LoopbackConnector;

#[async_trait]
impl Connector for LoopbackConnector {
    type Transport = LoopbackTransport;

    async fn connect(&self) -> Result<LoopbackTransport, BlackjackError> {
        // Client → dealer
        let (client_tx, dealer_rx) = mpsc::unbounded_channel();
        // Dealer → client
        let (dealer_tx, client_rx) = mpsc::unbounded_channel();

        tokio::spawn(toy_dealer(dealer_rx, dealer_tx));

        Ok(LoopbackTransport {
            tx: client_tx,
            rx: client_rx,
        })
    }
}

/// A dealer that always deals the same cards: 17 against a king, and the
/// dealer draws to 18.
async fn toy_dealer(mut rx: mpsc::UnboundedReceiver<String>, tx: mpsc::UnboundedSender<String>) {
    let mut balance: u32 = 100;
    let mut hand = vec!["10♠", "7♥"];

    while let Some(line) = rx.recv().await {
        tracing::debug!("dealer received {line:?}");
        let mut words = line.split_whitespace();
        let replies: Vec<String> = match words.next() {
            Some("LOGIN") => {
                let user = words.next().unwrap_or("guest");
                vec![format!("OK user:{user} balance:{balance}"), "AWAITING INPUT".into()]
            }
            Some("BET") => {
                let amount = words.next().and_then(|w| w.parse().ok()).unwrap_or(0);
                balance = balance.saturating_sub(amount);
                hand = vec!["10♠", "7♥"];
                vec![format!(
                    "OK balance:{balance} dealer:K♦ you:17 {} AWAITING INPUT",
                    hand.join(" ")
                )]
            }
            Some("HIT") => {
                hand.push("3♣");
                vec![format!("OK you:20 {} AWAITING INPUT", hand.join(" "))]
            }
            Some("STAND") => {
                let outcome = if hand.len() > 2 { "WIN" } else { "LOSE" };
                vec![
                    "DEALER 18 K♦ 8♠".into(),
                    format!("{outcome} AWAITING INPUT"),
                ]
            }
            Some("STATUS") => vec![format!("OK balance:{balance} AWAITING INPUT")],
            _ => vec!["ERROR unknown command AWAITING INPUT".into()],
        };
        for reply in replies {
            if tx.send(reply).is_err() {
                return;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Play two rounds, acting whenever the dealer asks for input
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (mut client, mut event_rx) = BlackjackClient::start(LoopbackConnector, ClientConfig::default());
    client.login("alice", "secret")?;

    let mut rounds_played = 0;
    while let Some(event) = event_rx.recv().await {
        let ClientEvent::Update { event, state } = event else {
            continue;
        };
        tracing::info!(
            "{:<14} round={} balance={} you={:?} dealer={:?} | {}",
            event.name(),
            state.round,
            state.player.balance,
            state.player.cards,
            state.dealer.cards,
            state.last_message
        );

        if !client.is_ready_for_input() {
            continue;
        }
        match state.round {
            Round::Betting if rounds_played == 0 => client.bet(25)?,
            Round::Betting => client.bet(10)?,
            // Second round: take one card before standing.
            Round::InRound if rounds_played == 1 && state.player.cards.len() == 2 => client.hit()?,
            Round::InRound => client.stand()?,
            Round::RoundOver => {
                rounds_played += 1;
                if rounds_played == 2 {
                    break;
                }
                client.new_round()?;
                // The new round is local; bet as soon as the table is clear.
                client.bet(10)?;
            }
            Round::Login => {}
        }
    }

    tracing::info!("final state: {:?}", client.game_state().await);
    client.shutdown().await;
    Ok(())
}
