//! Line protocol spoken with the remote dealer.
//!
//! Every message is one newline-terminated text line. The client sends the
//! commands in [`ClientCommand`]; the dealer answers with free-form lines that
//! [`parse`] classifies into exactly one [`ProtocolEvent`]. Independently of
//! its classification, any line containing [`AWAITING_INPUT`] tells the client
//! that the dealer will accept the next command (see [`signals_ready`]).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::card::is_card;

/// Marker the dealer includes in a line when it is ready for the next command.
pub const AWAITING_INPUT: &str = "AWAITING INPUT";

// ── Client → dealer ─────────────────────────────────────────────────

/// A command sent from the client to the dealer.
///
/// The [`Display`](fmt::Display) impl renders the exact wire line, without
/// the trailing newline (transports add it).
///
/// ```
/// use blackjack_client::protocol::ClientCommand;
///
/// assert_eq!(ClientCommand::Bet { amount: 25 }.to_string(), "BET 25");
/// assert_eq!(ClientCommand::Stand.to_string(), "STAND");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Authenticate the session.
    Login {
        /// Account name.
        username: String,
        /// Account password.
        password: String,
    },
    /// Stake `amount` on a new round.
    Bet {
        /// Chips to stake.
        amount: u32,
    },
    /// Draw one more card.
    Hit,
    /// Keep the current hand and let the dealer play.
    Stand,
    /// Double the stake, draw exactly one card and stand.
    Double,
    /// Harmless status probe used as a keepalive.
    Status,
}

impl ClientCommand {
    /// The command keyword, safe to log (never includes credentials).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "LOGIN",
            Self::Bet { .. } => "BET",
            Self::Hit => "HIT",
            Self::Stand => "STAND",
            Self::Double => "DOUBLE",
            Self::Status => "STATUS",
        }
    }
}

impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login { username, password } => write!(f, "LOGIN {username} {password}"),
            Self::Bet { amount } => write!(f, "BET {amount}"),
            other => f.write_str(other.name()),
        }
    }
}

impl fmt::Debug for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bet { amount } => f.debug_struct("Bet").field("amount", amount).finish(),
            Self::Hit => f.write_str("Hit"),
            Self::Stand => f.write_str("Stand"),
            Self::Double => f.write_str("Double"),
            Self::Status => f.write_str("Status"),
        }
    }
}

// ── Dealer → client ─────────────────────────────────────────────────

/// How a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The player was dealt a natural.
    PlayerBlackjack,
    /// The dealer was dealt a natural.
    DealerBlackjack,
    /// Both sides were dealt naturals.
    PushBothBlackjack,
    /// Tie.
    Push,
    /// The player beat the dealer.
    PlayerWin,
    /// The dealer beat the player.
    PlayerLose,
}

impl Outcome {
    /// Status line shown to the player for this outcome.
    pub fn message(self) -> &'static str {
        match self {
            Self::PlayerBlackjack => "Blackjack! You win.",
            Self::DealerBlackjack => "Dealer has blackjack.",
            Self::PushBothBlackjack => "Both have blackjack. Push.",
            Self::Push => "Push.",
            Self::PlayerWin => "You win!",
            Self::PlayerLose => "You lose.",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// One classified line received from the dealer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    /// `OK user:<name> ... balance:<N>`
    LoginAccepted {
        /// Account name echoed by the dealer.
        username: String,
        /// Authoritative balance.
        balance: u32,
    },
    /// `OK balance:<N> dealer:<card> you:<N> <card> <card>`
    InitialDeal {
        /// Balance after the stake was taken.
        balance: u32,
        /// The dealer's visible card.
        dealer_up_card: String,
        /// Authoritative player total.
        player_total: u32,
        /// The player's opening hand.
        player_cards: Vec<String>,
    },
    /// `OK you:<N> <card>+`, the full player hand after a draw.
    HandUpdated {
        /// Authoritative player total.
        player_total: u32,
        /// Every card in the player's hand.
        player_cards: Vec<String>,
    },
    /// Any other `OK ...` line.
    Acknowledged {
        /// The line as received.
        text: String,
    },
    /// One of the round-ending keywords.
    RoundOver {
        /// How the round ended.
        outcome: Outcome,
    },
    /// `ERROR ...`
    ErrorMessage {
        /// The line as received.
        text: String,
    },
    /// `DEALER <N> <card>+`, the dealer's full hand.
    DealerRevealed {
        /// Authoritative dealer total.
        dealer_total: u32,
        /// Every card in the dealer's hand.
        dealer_cards: Vec<String>,
    },
    /// A line carrying nothing but the ready marker.
    Prompt,
    /// A line matching none of the known shapes.
    Unrecognized {
        /// The line as received.
        text: String,
    },
}

impl ProtocolEvent {
    /// Short variant name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoginAccepted { .. } => "login_accepted",
            Self::InitialDeal { .. } => "initial_deal",
            Self::HandUpdated { .. } => "hand_updated",
            Self::Acknowledged { .. } => "acknowledged",
            Self::RoundOver { .. } => "round_over",
            Self::ErrorMessage { .. } => "error_message",
            Self::DealerRevealed { .. } => "dealer_revealed",
            Self::Prompt => "prompt",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }
}

/// Round-ending keywords in match priority. Longer phrases must precede the
/// shorter ones they overlap with.
const OUTCOMES: &[(&str, Outcome)] = &[
    ("BLACKJACK", Outcome::PlayerBlackjack),
    ("DEALER BLACKJACK", Outcome::DealerBlackjack),
    ("PUSH BOTH BLACKJACK", Outcome::PushBothBlackjack),
    ("PUSH", Outcome::Push),
    ("WIN", Outcome::PlayerWin),
    ("LOSE", Outcome::PlayerLose),
];

/// Returns `true` if the dealer is asking for the next command.
pub fn signals_ready(line: &str) -> bool {
    line.contains(AWAITING_INPUT)
}

/// Classify one received line.
///
/// Never fails: lines matching no known shape become
/// [`ProtocolEvent::Unrecognized`], and missing numbers default to zero.
///
/// ```
/// use blackjack_client::protocol::{parse, Outcome, ProtocolEvent};
///
/// assert_eq!(
///     parse("DEALER BLACKJACK"),
///     ProtocolEvent::RoundOver { outcome: Outcome::DealerBlackjack },
/// );
/// assert!(matches!(parse("???"), ProtocolEvent::Unrecognized { .. }));
/// ```
pub fn parse(line: &str) -> ProtocolEvent {
    let body = line.split(AWAITING_INPUT).next().unwrap_or(line).trim();

    if body.is_empty() {
        if signals_ready(line) {
            return ProtocolEvent::Prompt;
        }
        return ProtocolEvent::Unrecognized {
            text: line.trim().to_string(),
        };
    }

    if let Some(rest) = keyword(body, "OK") {
        return parse_ok(body, rest);
    }

    for (phrase, outcome) in OUTCOMES {
        if keyword(body, phrase).is_some() {
            return ProtocolEvent::RoundOver { outcome: *outcome };
        }
    }

    if keyword(body, "ERROR").is_some() {
        return ProtocolEvent::ErrorMessage {
            text: body.to_string(),
        };
    }

    if let Some(reveal) = keyword(body, "DEALER").and_then(parse_dealer) {
        return reveal;
    }

    ProtocolEvent::Unrecognized {
        text: line.trim().to_string(),
    }
}

/// Strip a leading keyword that ends on a word boundary.
fn keyword<'a>(body: &'a str, word: &str) -> Option<&'a str> {
    let rest = body.strip_prefix(word)?;
    if rest.is_empty() {
        Some(rest)
    } else if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

/// Value of the first `key:value` token.
fn field<'a>(tokens: &[&'a str], key: &str) -> Option<&'a str> {
    tokens.iter().find_map(|token| token.strip_prefix(key))
}

fn number(value: Option<&str>) -> u32 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

/// Card tokens immediately following the `key:value` token.
fn cards_after(tokens: &[&str], key: &str) -> Vec<String> {
    tokens
        .iter()
        .skip_while(|token| !token.starts_with(key))
        .skip(1)
        .take_while(|token| is_card(token))
        .map(|token| (*token).to_string())
        .collect()
}

fn parse_ok(body: &str, rest: &str) -> ProtocolEvent {
    let tokens: Vec<&str> = rest.split_whitespace().collect();

    if let Some(username) = field(&tokens, "user:") {
        return ProtocolEvent::LoginAccepted {
            username: username.to_string(),
            balance: number(field(&tokens, "balance:")),
        };
    }

    let you = field(&tokens, "you:");
    let dealer = field(&tokens, "dealer:");
    let balance = field(&tokens, "balance:");

    match (balance, dealer, you) {
        (Some(balance), Some(dealer), Some(you)) => ProtocolEvent::InitialDeal {
            balance: number(Some(balance)),
            dealer_up_card: dealer.to_string(),
            player_total: number(Some(you)),
            player_cards: cards_after(&tokens, "you:"),
        },
        (_, _, Some(you)) => ProtocolEvent::HandUpdated {
            player_total: number(Some(you)),
            player_cards: cards_after(&tokens, "you:"),
        },
        _ => ProtocolEvent::Acknowledged {
            text: body.to_string(),
        },
    }
}

fn parse_dealer(rest: &str) -> Option<ProtocolEvent> {
    let mut tokens = rest.split_whitespace();
    let dealer_total = tokens.next()?.parse().ok()?;
    let dealer_cards = tokens
        .take_while(|token| is_card(token))
        .map(str::to_string)
        .collect();
    Some(ProtocolEvent::DealerRevealed {
        dealer_total,
        dealer_cards,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn cards(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn keyword_requires_word_boundary() {
        assert_eq!(keyword("WIN", "WIN"), Some(""));
        assert_eq!(keyword("WIN big", "WIN"), Some("big"));
        assert_eq!(keyword("WINNER", "WIN"), None);
    }

    #[test]
    fn ready_marker_is_cut_before_classification() {
        assert_eq!(
            parse("OK you:19 10♠ 9♥ AWAITING INPUT"),
            ProtocolEvent::HandUpdated {
                player_total: 19,
                player_cards: cards(&["10♠", "9♥"]),
            }
        );
    }

    #[test]
    fn bare_marker_is_a_prompt() {
        assert_eq!(parse("AWAITING INPUT"), ProtocolEvent::Prompt);
        assert_eq!(parse("  AWAITING INPUT  "), ProtocolEvent::Prompt);
    }

    #[test]
    fn empty_line_is_unrecognized() {
        assert_eq!(
            parse(""),
            ProtocolEvent::Unrecognized {
                text: String::new()
            }
        );
    }

    #[test]
    fn card_run_stops_at_first_non_card() {
        assert_eq!(
            cards_after(&["you:12", "5♣", "7♦", "draw?", "K♠"], "you:"),
            cards(&["5♣", "7♦"])
        );
    }

    #[test]
    fn login_without_balance_defaults_to_zero() {
        assert_eq!(
            parse("OK user:carol"),
            ProtocolEvent::LoginAccepted {
                username: "carol".into(),
                balance: 0,
            }
        );
    }

    #[test]
    fn dealer_without_total_is_unrecognized() {
        assert!(matches!(
            parse("DEALER HITS"),
            ProtocolEvent::Unrecognized { .. }
        ));
    }

    #[test]
    fn login_debug_redacts_password() {
        let cmd = ClientCommand::Login {
            username: "alice".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{cmd:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
        assert_eq!(cmd.to_string(), "LOGIN alice hunter2");
    }
}
