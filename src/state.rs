//! Game state and its transition function.
//!
//! [`reduce`] folds classified dealer lines into a [`GameState`]. It is pure:
//! the same state and event always produce the same next state, and nothing
//! outside the returned value changes.
//!
//! Player commands are not reducer transitions. When the gate lets a command
//! onto the wire, [`GameState::apply_sent`] applies its optimistic effect
//! (debiting the stake right away); the dealer's next authoritative line
//! then overwrites whatever the client guessed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::card::card_value;
use crate::error::CommandRejection;
use crate::protocol::{ClientCommand, ProtocolEvent};

/// Balance shown before the dealer has reported one.
pub const DEFAULT_BALANCE: u32 = 100;

/// Phase of the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Round {
    /// No accepted login yet.
    #[default]
    Login,
    /// Waiting for a stake.
    Betting,
    /// Cards are out and the player may act.
    InRound,
    /// The outcome is known.
    RoundOver,
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Login => "LOGIN",
            Self::Betting => "BETTING",
            Self::InRound => "IN_ROUND",
            Self::RoundOver => "ROUND_OVER",
        })
    }
}

/// The player's side of the table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Chips not currently staked.
    pub balance: u32,
    /// Chips staked on this round.
    pub bet: u32,
    /// Cards in hand, in the order dealt.
    pub cards: Vec<String>,
    /// Hand total as reported by the dealer.
    pub total: u32,
}

/// The dealer's side of the table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealerState {
    /// Visible cards, in the order dealt.
    pub cards: Vec<String>,
    /// Total of the visible cards.
    pub total: u32,
}

/// Everything a renderer needs to draw the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Phase of the current round.
    pub round: Round,
    /// The player's hand and chips.
    pub player: PlayerState,
    /// The dealer's hand.
    pub dealer: DealerState,
    /// Latest human-readable status line.
    pub last_message: String,
}

impl GameState {
    /// A fresh state at the login screen.
    pub fn new(initial_balance: u32) -> Self {
        Self {
            round: Round::Login,
            player: PlayerState {
                balance: initial_balance,
                ..PlayerState::default()
            },
            dealer: DealerState::default(),
            last_message: String::new(),
        }
    }

    /// Check whether `command` makes sense right now.
    ///
    /// Mirrors which actions a table offers in each round: bets only between
    /// rounds and only up to the balance, hit/stand/double only with cards out,
    /// double only when the balance covers the stake again.
    ///
    /// # Errors
    ///
    /// Returns the reason the command would be refused.
    pub fn validate(&self, command: &ClientCommand) -> Result<(), CommandRejection> {
        match command {
            ClientCommand::Status => Ok(()),
            ClientCommand::Login { username, password } => {
                if is_wire_word(username) && is_wire_word(password) {
                    Ok(())
                } else {
                    Err(CommandRejection::InvalidCredentials)
                }
            }
            _ if self.round == Round::Login => Err(CommandRejection::NotLoggedIn),
            ClientCommand::Bet { amount } => {
                if self.round != Round::Betting {
                    Err(CommandRejection::WrongRound(self.round))
                } else if *amount == 0 {
                    Err(CommandRejection::InvalidAmount)
                } else if *amount > self.player.balance {
                    Err(CommandRejection::InsufficientBalance {
                        needed: *amount,
                        available: self.player.balance,
                    })
                } else {
                    Ok(())
                }
            }
            ClientCommand::Hit | ClientCommand::Stand if self.round != Round::InRound => {
                Err(CommandRejection::WrongRound(self.round))
            }
            ClientCommand::Hit | ClientCommand::Stand => Ok(()),
            ClientCommand::Double => {
                if self.round != Round::InRound {
                    Err(CommandRejection::WrongRound(self.round))
                } else if self.player.balance < self.player.bet {
                    Err(CommandRejection::InsufficientBalance {
                        needed: self.player.bet,
                        available: self.player.balance,
                    })
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Apply the optimistic effect of a command the gate just sent.
    ///
    /// Returns `true` if the state changed.
    pub fn apply_sent(&mut self, command: &ClientCommand) -> bool {
        match command {
            ClientCommand::Bet { amount } => {
                self.player.balance = self.player.balance.saturating_sub(*amount);
                self.player.bet = *amount;
                self.player.cards.clear();
                self.player.total = 0;
                self.dealer = DealerState::default();
                self.round = Round::InRound;
                self.last_message = "Dealing cards...".into();
            }
            ClientCommand::Hit => self.last_message = "Dealing a card...".into(),
            ClientCommand::Stand => self.last_message = "Standing. Dealer reveals...".into(),
            ClientCommand::Double => {
                self.player.balance = self.player.balance.saturating_sub(self.player.bet);
                self.player.bet = self.player.bet.saturating_mul(2);
                self.last_message = "Doubling down!".into();
            }
            ClientCommand::Login { .. } | ClientCommand::Status => return false,
        }
        true
    }

    /// Clear the table after a finished round, keeping the balance.
    ///
    /// # Errors
    ///
    /// Returns [`CommandRejection::WrongRound`] unless the round is over.
    pub fn new_round(&mut self) -> Result<(), CommandRejection> {
        if self.round != Round::RoundOver {
            return Err(CommandRejection::WrongRound(self.round));
        }
        self.player = PlayerState {
            balance: self.player.balance,
            ..PlayerState::default()
        };
        self.dealer = DealerState::default();
        self.round = Round::Betting;
        self.last_message = "Place your bet.".into();
        Ok(())
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(DEFAULT_BALANCE)
    }
}

fn is_wire_word(value: &str) -> bool {
    !value.is_empty() && !value.contains(char::is_whitespace)
}

/// Compute the state that follows `event`.
///
/// Card sequences are always replaced, never appended: the dealer sends whole
/// hands. Outcome and reveal lines may arrive in either order, so neither
/// touches what the other one sets.
pub fn reduce(state: &GameState, event: &ProtocolEvent) -> GameState {
    let mut next = state.clone();
    match event {
        ProtocolEvent::LoginAccepted { balance, .. } => {
            next = GameState::new(*balance);
            next.round = Round::Betting;
            next.last_message = "Logged in! Place your bet.".into();
        }
        ProtocolEvent::InitialDeal {
            balance,
            dealer_up_card,
            player_total,
            player_cards,
        } => {
            next.round = Round::InRound;
            next.player.balance = *balance;
            next.player.cards.clone_from(player_cards);
            next.player.total = *player_total;
            next.dealer = DealerState {
                cards: vec![dealer_up_card.clone()],
                total: card_value(dealer_up_card),
            };
            next.last_message = "Your move!".into();
        }
        ProtocolEvent::HandUpdated {
            player_total,
            player_cards,
        } => {
            next.player.cards.clone_from(player_cards);
            next.player.total = *player_total;
            next.last_message = format!("You have {player_total}.");
        }
        ProtocolEvent::RoundOver { outcome } => {
            next.round = Round::RoundOver;
            next.last_message = outcome.message().into();
        }
        ProtocolEvent::ErrorMessage { text } => {
            if next.round != Round::Login {
                next.round = Round::Betting;
            }
            next.last_message.clone_from(text);
        }
        ProtocolEvent::DealerRevealed {
            dealer_total,
            dealer_cards,
        } => {
            next.dealer.cards.clone_from(dealer_cards);
            next.dealer.total = *dealer_total;
        }
        ProtocolEvent::Acknowledged { .. }
        | ProtocolEvent::Prompt
        | ProtocolEvent::Unrecognized { .. } => {}
    }
    next
}
