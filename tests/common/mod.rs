#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for Blackjack Client integration tests.
//!
//! Provides a channel-driven [`MockTransport`], a [`MockConnector`] that hands
//! out one prepared transport per connection attempt, and the matching
//! [`MockDealer`] handles the tests use to play the dealer's side.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use blackjack_client::{
    BlackjackClient, BlackjackError, ClientConfig, ClientEvent, Connector, Transport,
};
use tokio::sync::mpsc;

/// How long a test waits for something the client should do promptly.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(30);

type Incoming = Option<Result<String, BlackjackError>>;

// ── MockTransport ───────────────────────────────────────────────────

/// A transport whose dealer side is driven by a [`MockDealer`].
pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<Incoming>,
    sent: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, line: String) -> Result<(), BlackjackError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BlackjackError::TransportClosed);
        }
        let _ = self.sent.send(line);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, BlackjackError>> {
        match self.incoming.recv().await {
            Some(item) => item,
            // Dealer handle dropped: stay silent until shutdown.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), BlackjackError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ── MockDealer ──────────────────────────────────────────────────────

/// The dealer's end of one [`MockTransport`].
pub struct MockDealer {
    tx: mpsc::UnboundedSender<Incoming>,
    sent: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl MockDealer {
    /// Deliver one line to the client.
    pub fn say(&self, line: &str) {
        self.tx.send(Some(Ok(line.to_string()))).unwrap();
    }

    /// Close the connection from the dealer's side.
    pub fn hang_up(&self) {
        self.tx.send(None).unwrap();
    }

    /// Make the client's next `recv` fail.
    pub fn fail(&self, message: &str) {
        self.tx
            .send(Some(Err(BlackjackError::TransportReceive(message.into()))))
            .unwrap();
    }

    /// Wait for the next line the client sends.
    pub async fn expect_sent(&mut self) -> String {
        tokio::time::timeout(STEP_TIMEOUT, self.sent.recv())
            .await
            .expect("timed out waiting for the client to send a line")
            .expect("transport dropped before sending")
    }

    /// The next line the client already sent, if any.
    pub fn try_sent(&mut self) -> Option<String> {
        self.sent.try_recv().ok()
    }

    /// Whether the client closed this connection.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn mock_pair() -> (MockTransport, MockDealer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    let transport = MockTransport {
        incoming: in_rx,
        sent: sent_tx,
        closed: Arc::clone(&closed),
    };
    let dealer = MockDealer {
        tx: in_tx,
        sent: sent_rx,
        closed,
    };
    (transport, dealer)
}

// ── MockConnector ───────────────────────────────────────────────────

/// Hands out prepared transports in order; refuses once they run out.
pub struct MockConnector {
    transports: StdMutex<VecDeque<MockTransport>>,
    attempts: Arc<AtomicUsize>,
}

impl MockConnector {
    /// A connector good for `connections` successful connects, plus the
    /// dealers for each of them and a shared attempt counter.
    pub fn new(connections: usize) -> (Self, Vec<MockDealer>, Arc<AtomicUsize>) {
        let mut transports = VecDeque::new();
        let mut dealers = Vec::new();
        for _ in 0..connections {
            let (transport, dealer) = mock_pair();
            transports.push_back(transport);
            dealers.push(dealer);
        }
        let attempts = Arc::new(AtomicUsize::new(0));
        let connector = Self {
            transports: StdMutex::new(transports),
            attempts: Arc::clone(&attempts),
        };
        (connector, dealers, attempts)
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self) -> Result<MockTransport, BlackjackError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.transports.lock().unwrap().pop_front().ok_or_else(|| {
            BlackjackError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "no more mock connections",
            ))
        })
    }
}

// ── Client helpers ──────────────────────────────────────────────────

/// Config used by most tests: keepalive off so timers stay out of the way.
pub fn quiet_config() -> ClientConfig {
    ClientConfig::default().with_keepalive_interval(Duration::ZERO)
}

/// Start a client over `connections` mock connections.
pub fn start_client(
    connections: usize,
    config: ClientConfig,
) -> (
    BlackjackClient,
    mpsc::Receiver<ClientEvent>,
    Vec<MockDealer>,
    Arc<AtomicUsize>,
) {
    let (connector, dealers, attempts) = MockConnector::new(connections);
    let (client, events) = BlackjackClient::start(connector, config);
    (client, events, dealers, attempts)
}

/// Receive events until one matches `pred`, returning it.
pub async fn wait_for<F>(events: &mut mpsc::Receiver<ClientEvent>, mut pred: F) -> ClientEvent
where
    F: FnMut(&ClientEvent) -> bool,
{
    tokio::time::timeout(STEP_TIMEOUT, async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Log `dealer` in as alice with the given balance and wait until the client
/// is ready for input.
pub async fn log_in(
    client: &BlackjackClient,
    events: &mut mpsc::Receiver<ClientEvent>,
    dealer: &mut MockDealer,
    balance: u32,
) {
    client.login("alice", "secret").unwrap();
    assert_eq!(dealer.expect_sent().await, "LOGIN alice secret");
    dealer.say(&format!("OK user:alice balance:{balance} AWAITING INPUT"));
    wait_for(events, |e| {
        matches!(
            e,
            ClientEvent::PhaseChanged {
                phase: blackjack_client::ConnectionPhase::AwaitingInput
            }
        )
    })
    .await;
}
