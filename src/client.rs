//! Async client for the dealer's line protocol.
//!
//! [`BlackjackClient`] is a thin handle that talks to one background session
//! task over an unbounded MPSC channel. The task owns the connection: it
//! opens transports through a [`Connector`], logs in, keeps the link alive
//! with `STATUS` probes, folds every received line into the [`GameState`],
//! and reconnects after a fixed delay whenever the connection drops while
//! credentials are held. Events are emitted on a bounded channel
//! ([`tokio::sync::mpsc::Receiver<ClientEvent>`]) returned from
//! [`BlackjackClient::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = TcpConnector::new("127.0.0.1:4000");
//! let (client, mut events) = BlackjackClient::start(connector, ClientConfig::default());
//!
//! client.login("alice", "secret")?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ClientEvent::Update { state, .. } => render(&state),
//!         ClientEvent::LoginRequired => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{BlackjackError, Result};
use crate::event::ClientEvent;
use crate::gate::CommandGate;
use crate::protocol::{parse, ClientCommand, ProtocolEvent};
use crate::state::{reduce, GameState, DEFAULT_BALANCE};
use crate::transport::{Connector, Transport};

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default pause between a connection loss and the next attempt.
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Default period of the `STATUS` keepalive probe.
const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(3);

/// Default limit for opening a connection.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`BlackjackClient`].
///
/// # Example
///
/// ```
/// use blackjack_client::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_reconnect_delay(Duration::from_secs(2))
///     .with_keepalive_interval(Duration::ZERO);
/// assert_eq!(config.reconnect_delay, Duration::from_secs(2));
/// assert!(config.keepalive_interval.is_zero());
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Pause between a connection loss and the next connection attempt.
    ///
    /// Defaults to **1 second**. The delay does not grow between attempts.
    pub reconnect_delay: Duration,
    /// Period of the `STATUS` keepalive probe sent while the dealer awaits
    /// input.
    ///
    /// Defaults to **3 seconds**. A zero interval disables the keepalive.
    pub keepalive_interval: Duration,
    /// Limit for a single connection attempt.
    ///
    /// Defaults to **5 seconds**.
    pub connect_timeout: Duration,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up, events are dropped (with a warning
    /// logged) instead of blocking the session. `Disconnected` is always
    /// delivered. Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Time [`BlackjackClient::shutdown`] waits for the session task to close
    /// the connection before aborting it.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// Balance displayed before the dealer reports one.
    ///
    /// Defaults to **100**.
    pub initial_balance: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            initial_balance: DEFAULT_BALANCE,
        }
    }
}

impl ClientConfig {
    /// Set the pause before reconnecting.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the keepalive period. Zero disables the keepalive.
    #[must_use]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Set the limit for a single connection attempt.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the capacity of the bounded event channel. Values below 1 are
    /// clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the balance displayed before the dealer reports one.
    #[must_use]
    pub fn with_initial_balance(mut self, balance: u32) -> Self {
        self.initial_balance = balance;
        self
    }
}

// ── Connection phase ────────────────────────────────────────────────

/// Where the connection to the dealer stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ConnectionPhase {
    /// No transport is open.
    Disconnected = 0,
    /// A transport is being opened.
    Connecting = 1,
    /// `LOGIN` was offered; waiting for the dealer to accept it.
    AwaitingLoginResult = 2,
    /// Logged in and the dealer accepts the next command.
    AwaitingInput = 3,
    /// A command was sent and the dealer has not asked for more input yet.
    CommandInFlight = 4,
    /// The transport is being closed.
    Closing = 5,
}

impl ConnectionPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::AwaitingLoginResult,
            3 => Self::AwaitingInput,
            4 => Self::CommandInFlight,
            5 => Self::Closing,
            _ => Self::Disconnected,
        }
    }
}

// ── Requests ────────────────────────────────────────────────────────

/// Account credentials, kept for automatic reconnection.
#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    fn command(&self) -> ClientCommand {
        ClientCommand::Login {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Requests queued from the handle to the session task.
#[derive(Debug)]
enum Request {
    Login(Credentials),
    Command(ClientCommand),
    NewRound,
    Logout,
}

// ── Shared state ────────────────────────────────────────────────────

/// State published by the session task for the handle's accessors.
struct SharedState {
    running: AtomicBool,
    phase: AtomicU8,
    has_credentials: AtomicBool,
    game: Mutex<GameState>,
}

impl SharedState {
    fn new(initial_balance: u32) -> Self {
        Self {
            running: AtomicBool::new(true),
            phase: AtomicU8::new(ConnectionPhase::Disconnected as u8),
            has_credentials: AtomicBool::new(false),
            game: Mutex::new(GameState::new(initial_balance)),
        }
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for the dealer's line protocol.
///
/// Created via [`BlackjackClient::start`], which spawns the background
/// session task and returns this handle together with an event receiver.
///
/// Every action method queues a request to the session task and returns
/// immediately. Whether a command actually reaches the dealer is reported on
/// the event channel: commands issued while another one is in flight are
/// dropped ([`ClientEvent::CommandDropped`]), not queued. Check
/// [`is_ready_for_input`](Self::is_ready_for_input) before issuing a command
/// if delivery matters.
pub struct BlackjackClient {
    /// Sender half of the request channel to the session task.
    req_tx: mpsc::UnboundedSender<Request>,
    /// Shared state updated by the session task.
    shared: Arc<SharedState>,
    /// Handle to the background session task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the session task to shut down gracefully.
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Timeout for the graceful shutdown.
    shutdown_timeout: Duration,
}

impl BlackjackClient {
    /// Start the session task and return a handle plus event receiver.
    ///
    /// No connection is opened until [`login`](Self::login) is called.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start<C: Connector>(
        connector: C,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (req_tx, req_rx) = mpsc::unbounded_channel::<Request>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<ClientEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let shared = Arc::new(SharedState::new(config.initial_balance));
        let shutdown_timeout = config.shutdown_timeout;

        let session = Session {
            connector,
            game: GameState::new(config.initial_balance),
            config,
            shared: Arc::clone(&shared),
            event_tx,
            phase: ConnectionPhase::Disconnected,
            credentials: None,
        };
        let task = tokio::spawn(session.run(req_rx, shutdown_rx));

        let client = Self {
            req_tx,
            shared,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Public API methods ──────────────────────────────────────────

    /// Log in, connecting first if necessary.
    ///
    /// The credentials are kept so the session can log in again after a
    /// connection loss.
    ///
    /// # Errors
    ///
    /// Returns [`BlackjackError::NotConnected`] if the session task has
    /// stopped.
    pub fn login(&self, username: impl Into<String>, password: impl Into<String>) -> Result<()> {
        self.request(Request::Login(Credentials {
            username: username.into(),
            password: password.into(),
        }))
    }

    /// Stake `amount` on a new round.
    ///
    /// # Errors
    ///
    /// Returns [`BlackjackError::NotConnected`] if the session task has
    /// stopped.
    pub fn bet(&self, amount: u32) -> Result<()> {
        self.command(ClientCommand::Bet { amount })
    }

    /// Draw another card.
    ///
    /// # Errors
    ///
    /// Returns [`BlackjackError::NotConnected`] if the session task has
    /// stopped.
    pub fn hit(&self) -> Result<()> {
        self.command(ClientCommand::Hit)
    }

    /// Stand on the current hand.
    ///
    /// # Errors
    ///
    /// Returns [`BlackjackError::NotConnected`] if the session task has
    /// stopped.
    pub fn stand(&self) -> Result<()> {
        self.command(ClientCommand::Stand)
    }

    /// Double the stake and draw one final card.
    ///
    /// # Errors
    ///
    /// Returns [`BlackjackError::NotConnected`] if the session task has
    /// stopped.
    pub fn double(&self) -> Result<()> {
        self.command(ClientCommand::Double)
    }

    /// Ask the dealer for a status line.
    ///
    /// # Errors
    ///
    /// Returns [`BlackjackError::NotConnected`] if the session task has
    /// stopped.
    pub fn status(&self) -> Result<()> {
        self.command(ClientCommand::Status)
    }

    /// Clear the table after a finished round. Purely local; nothing is sent.
    ///
    /// # Errors
    ///
    /// Returns [`BlackjackError::NotConnected`] if the session task has
    /// stopped.
    pub fn new_round(&self) -> Result<()> {
        self.request(Request::NewRound)
    }

    /// Close the connection and forget the credentials. No reconnection
    /// follows.
    ///
    /// # Errors
    ///
    /// Returns [`BlackjackError::NotConnected`] if the session task has
    /// stopped.
    pub fn logout(&self) -> Result<()> {
        self.request(Request::Logout)
    }

    /// Shut down the client, closing any open connection and stopping the
    /// background task.
    ///
    /// After calling this method, the event receiver yields `None` once the
    /// session task exits.
    pub async fn shutdown(&mut self) {
        debug!("BlackjackClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the session task with a timeout. If it doesn't exit in time,
        // abort it so the task cannot detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("session task terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("session task did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("session task aborted: {join_err}");
                    }
                }
            }
        }

        self.shared.running.store(false, Ordering::Release);
        self.shared
            .phase
            .store(ConnectionPhase::Disconnected as u8, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Current connection phase.
    pub fn phase(&self) -> ConnectionPhase {
        ConnectionPhase::from_u8(self.shared.phase.load(Ordering::Acquire))
    }

    /// Returns `true` if a command issued now would be sent.
    pub fn is_ready_for_input(&self) -> bool {
        self.phase() == ConnectionPhase::AwaitingInput
    }

    /// Returns `true` if credentials for automatic reconnection are held.
    pub fn has_credentials(&self) -> bool {
        self.shared.has_credentials.load(Ordering::Acquire)
    }

    /// Returns `true` while the session task is running.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Snapshot of the latest game state.
    pub async fn game_state(&self) -> GameState {
        self.shared.game.lock().await.clone()
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn command(&self, command: ClientCommand) -> Result<()> {
        self.request(Request::Command(command))
    }

    /// Queue a request to the session task.
    fn request(&self, request: Request) -> Result<()> {
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(BlackjackError::NotConnected);
        }
        self.req_tx
            .send(request)
            .map_err(|_| BlackjackError::NotConnected)
    }
}

impl fmt::Debug for BlackjackClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlackjackClient")
            .field("phase", &self.phase())
            .field("has_credentials", &self.has_credentials())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for BlackjackClient {
    fn drop(&mut self) {
        // `Drop` cannot await a graceful close; abort the task so the
        // transport is dropped with it.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Session task ────────────────────────────────────────────────────

/// Why a connection ended.
#[derive(Debug)]
enum Exit {
    Shutdown,
    Logout,
    Lost(Option<String>),
}

/// Per-connection state, discarded when the transport closes.
struct Link {
    gate: CommandGate,
    login_sent: bool,
    logged_in: bool,
}

/// The lifecycle manager. Owns everything mutable; runs as one task so each
/// request, timer tick and received line is handled to completion before the
/// next one.
struct Session<C: Connector> {
    connector: C,
    config: ClientConfig,
    shared: Arc<SharedState>,
    event_tx: mpsc::Sender<ClientEvent>,
    phase: ConnectionPhase,
    credentials: Option<Credentials>,
    game: GameState,
}

impl<C: Connector> Session<C> {
    async fn run(
        mut self,
        mut req_rx: mpsc::UnboundedReceiver<Request>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        debug!("session task started");
        let mut reconnect_at: Option<Instant> = None;

        loop {
            let connect = tokio::select! {
                _ = &mut shutdown_rx => break,
                () = sleep_until_deadline(reconnect_at) => {
                    info!("reconnecting to dealer");
                    true
                }
                request = req_rx.recv() => match request {
                    None => break,
                    Some(Request::Login(credentials)) => {
                        // Always followed by a connect, so they are the ones tried next.
                        let valid = self.check_credentials(&credentials).await;
                        if valid {
                            self.store_credentials(credentials);
                        }
                        valid
                    }
                    Some(Request::Logout) => {
                        reconnect_at = None;
                        self.log_out().await;
                        false
                    }
                    Some(Request::NewRound) => {
                        self.new_round().await;
                        false
                    }
                    Some(Request::Command(command)) => {
                        if self.check_command(&command).await {
                            debug!(command = command.name(), "not connected, dropping command");
                            emit_event(&self.event_tx, ClientEvent::CommandDropped { command }).await;
                        }
                        false
                    }
                },
            };
            if !connect {
                continue;
            }

            reconnect_at = None;
            match self.connect_and_serve(&mut req_rx, &mut shutdown_rx).await {
                Exit::Shutdown => break,
                Exit::Logout => self.log_out().await,
                Exit::Lost(_) if self.credentials.is_some() => {
                    let delay = self.config.reconnect_delay;
                    reconnect_at = Some(Instant::now() + delay);
                    info!(?delay, "connection lost, reconnect scheduled");
                    emit_event(&self.event_tx, ClientEvent::ReconnectScheduled { delay }).await;
                }
                Exit::Lost(_) => {
                    info!("connection lost without credentials, waiting for login");
                    self.reset_game().await;
                    emit_event(&self.event_tx, ClientEvent::LoginRequired).await;
                }
            }
        }

        self.shared.running.store(false, Ordering::Release);
        self.set_phase(ConnectionPhase::Disconnected).await;
        debug!("session task exited");
    }

    /// Open a transport, log in and serve it until it ends.
    async fn connect_and_serve(
        &mut self,
        req_rx: &mut mpsc::UnboundedReceiver<Request>,
        shutdown_rx: &mut oneshot::Receiver<()>,
    ) -> Exit {
        self.set_phase(ConnectionPhase::Connecting).await;

        let attempt = tokio::time::timeout(self.config.connect_timeout, self.connector.connect());
        let opened = tokio::select! {
            _ = &mut *shutdown_rx => Err(Exit::Shutdown),
            result = attempt => match result {
                Ok(Ok(transport)) => Ok(transport),
                Ok(Err(e)) => {
                    warn!(error = %e, "connect failed");
                    Err(Exit::Lost(Some(format!("connect failed: {e}"))))
                }
                Err(_) => {
                    warn!(timeout = ?self.config.connect_timeout, "connect timed out");
                    Err(Exit::Lost(Some(BlackjackError::Timeout.to_string())))
                }
            },
        };

        let mut transport = match opened {
            Ok(transport) => transport,
            Err(exit) => {
                if let Exit::Lost(reason) = &exit {
                    emit_disconnected(&self.event_tx, reason.clone()).await;
                }
                self.set_phase(ConnectionPhase::Disconnected).await;
                return exit;
            }
        };

        info!("connected to dealer");
        emit_event(&self.event_tx, ClientEvent::Connected).await;

        let mut link = Link {
            gate: CommandGate::new(),
            login_sent: false,
            logged_in: false,
        };
        self.settle_phase(&link).await;

        let exit = match self.credentials.clone() {
            Some(credentials) => match self.send_login(&mut transport, &mut link, &credentials).await {
                Ok(_) => self.serve(&mut transport, &mut link, req_rx, shutdown_rx).await,
                Err(exit) => exit,
            },
            None => self.serve(&mut transport, &mut link, req_rx, shutdown_rx).await,
        };

        self.set_phase(ConnectionPhase::Closing).await;
        if let Err(e) = transport.close().await {
            debug!(error = %e, "transport close failed");
        }
        let reason = match &exit {
            Exit::Shutdown => Some("client shut down".to_string()),
            Exit::Logout => Some("logged out".to_string()),
            Exit::Lost(reason) => reason.clone(),
        };
        emit_disconnected(&self.event_tx, reason).await;
        self.set_phase(ConnectionPhase::Disconnected).await;
        exit
    }

    /// Multiplex requests, keepalive ticks and received lines on one
    /// connection. The keepalive timer lives and dies with this call.
    async fn serve(
        &mut self,
        transport: &mut C::Transport,
        link: &mut Link,
        req_rx: &mut mpsc::UnboundedReceiver<Request>,
        shutdown_rx: &mut oneshot::Receiver<()>,
    ) -> Exit {
        let mut keepalive = keepalive_timer(self.config.keepalive_interval);

        loop {
            tokio::select! {
                _ = &mut *shutdown_rx => {
                    debug!("shutdown signal received");
                    return Exit::Shutdown;
                }

                request = req_rx.recv() => {
                    let outcome = match request {
                        None => return Exit::Shutdown,
                        Some(Request::Logout) => return Exit::Logout,
                        Some(Request::Login(credentials)) => {
                            self.relogin(transport, link, credentials).await
                        }
                        Some(Request::NewRound) => {
                            self.new_round().await;
                            Ok(())
                        }
                        Some(Request::Command(command)) => {
                            self.send_command(transport, link, command).await
                        }
                    };
                    if let Err(exit) = outcome {
                        return exit;
                    }
                }

                () = tick(&mut keepalive) => {
                    if self.phase == ConnectionPhase::AwaitingInput {
                        debug!("keepalive probe");
                        if let Err(exit) = self.offer(transport, link, &ClientCommand::Status).await {
                            return exit;
                        }
                    }
                }

                incoming = transport.recv() => match incoming {
                    Some(Ok(line)) => self.handle_line(link, &line).await,
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        return Exit::Lost(Some(format!("transport receive error: {e}")));
                    }
                    None => {
                        info!("dealer closed the connection");
                        return Exit::Lost(None);
                    }
                },
            }
        }
    }

    /// Classify a line, fold it into the game state and release the gate if
    /// the dealer asks for input. Both effects may come from the same line.
    async fn handle_line(&mut self, link: &mut Link, line: &str) {
        let event = parse(line);
        match &event {
            ProtocolEvent::Unrecognized { text } if !text.is_empty() => {
                warn!(line = %text, "unrecognized line from dealer");
            }
            _ => debug!(event = event.name(), "line received"),
        }

        self.game = reduce(&self.game, &event);
        self.publish_game().await;

        match &event {
            ProtocolEvent::LoginAccepted { username, balance } => {
                info!(%username, balance, "login accepted");
                link.logged_in = true;
            }
            ProtocolEvent::ErrorMessage { text } if link.login_sent && !link.logged_in => {
                warn!(message = %text, "login rejected");
                link.login_sent = false;
                self.forget_credentials();
                self.reset_game().await;
                emit_event(
                    &self.event_tx,
                    ClientEvent::LoginRejected {
                        message: text.clone(),
                    },
                )
                .await;
            }
            _ => {}
        }

        link.gate.observe(line);
        self.settle_phase(link).await;
        emit_event(
            &self.event_tx,
            ClientEvent::Update {
                event,
                state: Box::new(self.game.clone()),
            },
        )
        .await;
    }

    /// Validate a user command and offer it to the gate.
    async fn send_command(
        &mut self,
        transport: &mut C::Transport,
        link: &mut Link,
        command: ClientCommand,
    ) -> std::result::Result<(), Exit> {
        if !self.check_command(&command).await {
            return Ok(());
        }

        if self.phase != ConnectionPhase::AwaitingInput {
            debug!(command = command.name(), phase = ?self.phase, "not awaiting input, dropping command");
            emit_event(&self.event_tx, ClientEvent::CommandDropped { command }).await;
            return Ok(());
        }

        if !self.offer(transport, link, &command).await? {
            emit_event(&self.event_tx, ClientEvent::CommandDropped { command }).await;
            return Ok(());
        }

        if self.game.apply_sent(&command) {
            self.publish_game().await;
            emit_event(
                &self.event_tx,
                ClientEvent::LocalUpdate {
                    state: Box::new(self.game.clone()),
                },
            )
            .await;
        }
        Ok(())
    }

    /// Offer `LOGIN` to the gate. Returns whether it went out.
    async fn send_login(
        &mut self,
        transport: &mut C::Transport,
        link: &mut Link,
        credentials: &Credentials,
    ) -> std::result::Result<bool, Exit> {
        let command = credentials.command();
        if self.offer(transport, link, &command).await? {
            info!(username = %credentials.username, "login sent");
            link.login_sent = true;
            link.logged_in = false;
            self.settle_phase(link).await;
            Ok(true)
        } else {
            emit_event(&self.event_tx, ClientEvent::CommandDropped { command }).await;
            Ok(false)
        }
    }

    /// Log in again on an open connection. The held credentials only change
    /// once the new `LOGIN` is on the wire.
    async fn relogin(
        &mut self,
        transport: &mut C::Transport,
        link: &mut Link,
        credentials: Credentials,
    ) -> std::result::Result<(), Exit> {
        if !self.check_credentials(&credentials).await {
            return Ok(());
        }
        if self.send_login(transport, link, &credentials).await? {
            self.store_credentials(credentials);
        }
        Ok(())
    }

    /// Pass a command through the gate. A send failure ends the connection.
    async fn offer(
        &mut self,
        transport: &mut C::Transport,
        link: &mut Link,
        command: &ClientCommand,
    ) -> std::result::Result<bool, Exit> {
        match link.gate.try_send(transport, command).await {
            Ok(sent) => {
                self.settle_phase(link).await;
                Ok(sent)
            }
            Err(e) => {
                error!("transport send error: {e}");
                Err(Exit::Lost(Some(format!("transport send error: {e}"))))
            }
        }
    }

    /// Run local validation, reporting a refusal as `CommandRejected`.
    async fn check_command(&self, command: &ClientCommand) -> bool {
        match self.game.validate(command) {
            Ok(()) => true,
            Err(reason) => {
                debug!(command = command.name(), %reason, "command rejected");
                emit_event(
                    &self.event_tx,
                    ClientEvent::CommandRejected {
                        command: command.clone(),
                        reason,
                    },
                )
                .await;
                false
            }
        }
    }

    /// Check that credentials fit on a protocol line.
    async fn check_credentials(&self, credentials: &Credentials) -> bool {
        self.check_command(&credentials.command()).await
    }

    fn store_credentials(&mut self, credentials: Credentials) {
        self.credentials = Some(credentials);
        self.shared.has_credentials.store(true, Ordering::Release);
    }

    fn forget_credentials(&mut self) {
        self.credentials = None;
        self.shared.has_credentials.store(false, Ordering::Release);
    }

    async fn log_out(&mut self) {
        self.forget_credentials();
        self.game = GameState::new(self.config.initial_balance);
        self.publish_game().await;
        emit_event(&self.event_tx, ClientEvent::LoginRequired).await;
    }

    /// Back to the login screen, keeping the last status line.
    async fn reset_game(&mut self) {
        let mut fresh = GameState::new(self.config.initial_balance);
        fresh.last_message = std::mem::take(&mut self.game.last_message);
        self.game = fresh;
        self.publish_game().await;
    }

    async fn new_round(&mut self) {
        match self.game.new_round() {
            Ok(()) => {
                self.publish_game().await;
                emit_event(
                    &self.event_tx,
                    ClientEvent::LocalUpdate {
                        state: Box::new(self.game.clone()),
                    },
                )
                .await;
            }
            Err(reason) => debug!(%reason, "new round ignored"),
        }
    }

    /// Derive the phase of an open connection from the link.
    async fn settle_phase(&mut self, link: &Link) {
        let phase = if !link.logged_in {
            ConnectionPhase::AwaitingLoginResult
        } else if link.gate.is_ready() {
            ConnectionPhase::AwaitingInput
        } else {
            ConnectionPhase::CommandInFlight
        };
        self.set_phase(phase).await;
    }

    async fn set_phase(&mut self, phase: ConnectionPhase) {
        if self.phase == phase {
            return;
        }
        debug!(from = ?self.phase, to = ?phase, "phase changed");
        self.phase = phase;
        self.shared.phase.store(phase as u8, Ordering::Release);
        emit_event(&self.event_tx, ClientEvent::PhaseChanged { phase }).await;
    }

    async fn publish_game(&self) {
        *self.shared.game.lock().await = self.game.clone();
    }
}

/// Sleep until `deadline`, or forever if there is none.
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn keepalive_timer(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut timer = tokio::time::interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(timer)
}

/// Wait for the next keepalive tick, or forever if keepalive is disabled.
async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Emit an event to the event channel. If the channel is full, log a warning
/// and drop the event to avoid blocking the session.
async fn emit_event(event_tx: &mpsc::Sender<ClientEvent>, event: ClientEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit a [`Disconnected`](ClientEvent::Disconnected) event.
///
/// Uses `send().await` instead of `try_send` so a connection loss is never
/// silently dropped.
async fn emit_disconnected(event_tx: &mpsc::Sender<ClientEvent>, reason: Option<String>) {
    if event_tx
        .send(ClientEvent::Disconnected { reason })
        .await
        .is_err()
    {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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
    use crate::error::CommandRejection;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Connector whose every attempt is refused.
    struct RefusingConnector {
        attempts: Arc<AtomicUsize>,
    }

    struct NeverTransport;

    #[async_trait]
    impl Transport for NeverTransport {
        async fn send(&mut self, _line: String) -> Result<()> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String>> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Connector for RefusingConnector {
        type Transport = NeverTransport;

        async fn connect(&self) -> Result<NeverTransport> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(BlackjackError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            )))
        }
    }

    fn refusing() -> (RefusingConnector, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        (
            RefusingConnector {
                attempts: Arc::clone(&attempts),
            },
            attempts,
        )
    }

    #[test]
    fn config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
        assert_eq!(config.keepalive_interval, Duration::from_secs(3));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.initial_balance, 100);
    }

    #[test]
    fn event_channel_capacity_is_clamped_to_one() {
        let config = ClientConfig::default().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[test]
    fn phase_survives_atomic_round_trip() {
        for phase in [
            ConnectionPhase::Disconnected,
            ConnectionPhase::Connecting,
            ConnectionPhase::AwaitingLoginResult,
            ConnectionPhase::AwaitingInput,
            ConnectionPhase::CommandInFlight,
            ConnectionPhase::Closing,
        ] {
            assert_eq!(ConnectionPhase::from_u8(phase as u8), phase);
        }
        assert_eq!(ConnectionPhase::from_u8(200), ConnectionPhase::Disconnected);
    }

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = Credentials {
            username: "alice".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{credentials:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    #[tokio::test]
    async fn starts_disconnected_without_connecting() {
        let (connector, attempts) = refusing();
        let (mut client, _events) = BlackjackClient::start(connector, ClientConfig::default());

        tokio::task::yield_now().await;
        assert_eq!(client.phase(), ConnectionPhase::Disconnected);
        assert!(!client.has_credentials());
        assert_eq!(attempts.load(Ordering::SeqCst), 0);

        client.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn refused_connections_are_retried_with_fixed_delay() {
        let (connector, attempts) = refusing();
        let config = ClientConfig::default().with_reconnect_delay(Duration::from_secs(1));
        let (mut client, mut events) = BlackjackClient::start(connector, config);

        client.login("alice", "pw").unwrap();

        let mut scheduled = 0;
        while scheduled < 3 {
            match events.recv().await.unwrap() {
                ClientEvent::ReconnectScheduled { delay } => {
                    assert_eq!(delay, Duration::from_secs(1));
                    scheduled += 1;
                }
                ClientEvent::LoginRequired => panic!("credentials must be kept"),
                _ => {}
            }
        }
        assert!(attempts.load(Ordering::SeqCst) >= 3);
        assert!(client.has_credentials());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn commands_before_login_are_rejected() {
        let (connector, _attempts) = refusing();
        let (mut client, mut events) = BlackjackClient::start(connector, ClientConfig::default());

        client.hit().unwrap();
        let event = events.recv().await.unwrap();
        assert!(matches!(
            event,
            ClientEvent::CommandRejected {
                command: ClientCommand::Hit,
                reason: CommandRejection::NotLoggedIn,
            }
        ));

        // Status needs no login but still cannot go anywhere.
        client.status().unwrap();
        let event = events.recv().await.unwrap();
        assert!(matches!(
            event,
            ClientEvent::CommandDropped {
                command: ClientCommand::Status
            }
        ));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn blank_credentials_never_connect() {
        let (connector, attempts) = refusing();
        let (mut client, mut events) = BlackjackClient::start(connector, ClientConfig::default());

        client.login("alice", "").unwrap();
        let event = events.recv().await.unwrap();
        assert!(matches!(event, ClientEvent::CommandRejected { .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
        assert!(!client.has_credentials());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn requests_fail_after_shutdown() {
        let (connector, _attempts) = refusing();
        let (mut client, _events) = BlackjackClient::start(connector, ClientConfig::default());

        client.shutdown().await;

        assert!(matches!(client.bet(10), Err(BlackjackError::NotConnected)));
        assert!(!client.is_running());
    }
}
