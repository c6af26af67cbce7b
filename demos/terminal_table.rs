//! # Terminal Table Example
//!
//! Plays blackjack against a TCP dealer from the terminal:
//!
//! 1. Type `login <user> <password>` to connect and log in
//! 2. Play with `bet <amount>`, `hit`, `stand`, `double`
//! 3. Start the next round with `new`
//! 4. `logout` closes the connection, `quit` (or Ctrl+C) exits
//!
//! The table is redrawn on every state change. Lost connections are
//! re-established automatically while logged in.
//!
//! ## Running
//!
//! ```sh
//! # Start a dealer on localhost:4000, then:
//! cargo run --example terminal_table
//!
//! # Override the dealer address:
//! BLACKJACK_ADDR=10.0.0.5:4000 cargo run --example terminal_table
//! ```

use blackjack_client::{
    BlackjackClient, ClientConfig, ClientEvent, GameState, Round, TcpConnector,
};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Default dealer address when `BLACKJACK_ADDR` is not set.
const DEFAULT_ADDR: &str = "127.0.0.1:4000";

/// One line typed by the player.
enum Input {
    Login(String, String),
    Bet(u32),
    Hit,
    Stand,
    Double,
    NewRound,
    Logout,
    Quit,
    Help,
}

fn parse_input(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Input::Help);
    };
    let input = match verb.to_ascii_lowercase().as_str() {
        "login" => match (words.next(), words.next()) {
            (Some(user), Some(pass)) => Input::Login(user.to_string(), pass.to_string()),
            _ => return Err("usage: login <user> <password>".into()),
        },
        "bet" => {
            let amount = words
                .next()
                .ok_or("usage: bet <amount>")?
                .parse::<u32>()
                .map_err(|_| "amount must be a positive whole number")?;
            Input::Bet(amount)
        }
        "hit" | "h" => Input::Hit,
        "stand" | "s" => Input::Stand,
        "double" | "d" => Input::Double,
        "new" | "n" => Input::NewRound,
        "logout" => Input::Logout,
        "quit" | "exit" | "q" => Input::Quit,
        _ => Input::Help,
    };
    Ok(input)
}

fn render(state: &GameState) {
    println!();
    println!("── {} ── balance {} ── bet {}", state.round, state.player.balance, state.player.bet);
    if !state.dealer.cards.is_empty() {
        println!("  dealer: {} ({})", state.dealer.cards.join(" "), state.dealer.total);
    }
    if !state.player.cards.is_empty() {
        println!("  you:    {} ({})", state.player.cards.join(" "), state.player.total);
    }
    if !state.last_message.is_empty() {
        println!("  {}", state.last_message);
    }
    let hint = match state.round {
        Round::Login => "login <user> <password>",
        Round::Betting => "bet <amount>",
        Round::InRound => "hit | stand | double",
        Round::RoundOver => "new",
    };
    println!("  > {hint}");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=blackjack_client=debug` to watch the wire.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let addr = std::env::var("BLACKJACK_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    tracing::info!("Dealer at {addr}");

    let (mut client, mut event_rx) =
        BlackjackClient::start(TcpConnector::new(addr), ClientConfig::default());
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    render(&client.game_state().await);

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };
                match event {
                    ClientEvent::Update { state, .. } | ClientEvent::LocalUpdate { state } => {
                        render(&state);
                    }
                    ClientEvent::CommandDropped { command } => {
                        println!("  (dealer is busy, {} not sent; try again)", command.name());
                    }
                    ClientEvent::CommandRejected { command, reason } => {
                        println!("  ({} refused: {reason})", command.name());
                    }
                    ClientEvent::LoginRejected { message } => {
                        println!("  login failed: {message}");
                    }
                    ClientEvent::Disconnected { reason } => {
                        println!("  disconnected: {}", reason.as_deref().unwrap_or("connection closed"));
                    }
                    ClientEvent::ReconnectScheduled { delay } => {
                        println!("  reconnecting in {delay:?}...");
                    }
                    ClientEvent::LoginRequired => {
                        render(&client.game_state().await);
                    }
                    other => tracing::debug!("Event: {other:?}"),
                }
            }

            line = stdin.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let input = match parse_input(&line) {
                    Ok(input) => input,
                    Err(usage) => {
                        println!("  {usage}");
                        continue;
                    }
                };
                match input {
                    Input::Login(user, pass) => client.login(user, pass)?,
                    Input::Bet(amount) => client.bet(amount)?,
                    Input::Hit => client.hit()?,
                    Input::Stand => client.stand()?,
                    Input::Double => client.double()?,
                    Input::NewRound => client.new_round()?,
                    Input::Logout => client.logout()?,
                    Input::Quit => break,
                    Input::Help => {
                        println!("  commands: login, bet, hit, stand, double, new, logout, quit");
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }

    // ── Shutdown ────────────────────────────────────────────────────
    client.shutdown().await;
    Ok(())
}
