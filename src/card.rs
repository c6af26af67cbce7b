//! Card tokens as they appear on the wire.
//!
//! The dealer sends cards as opaque `rank + suit` tokens such as `"10♠"` or
//! `"K♦"`. The client never needs more than the rank's point value, so tokens
//! stay strings and only the helpers below look inside them.

/// Suit glyphs accepted in a card token. The ASCII letters cover dealers that
/// cannot emit the unicode symbols.
const SUITS: &[char] = &['♠', '♥', '♦', '♣', 'S', 'H', 'D', 'C'];

/// Split a token into its rank and suit, if it has the shape of a card.
fn split_token(token: &str) -> Option<(&str, char)> {
    let suit = token.chars().next_back()?;
    let rank = token.strip_suffix(suit)?;
    if rank.is_empty() || !SUITS.contains(&suit) {
        return None;
    }
    Some((rank, suit))
}

/// Point value of a rank, or `None` for anything that is not a rank.
fn rank_value(rank: &str) -> Option<u32> {
    match rank {
        "A" => Some(11),
        "J" | "Q" | "K" => Some(10),
        _ => rank.parse::<u32>().ok().filter(|n| (2..=10).contains(n)),
    }
}

/// Returns `true` if `token` looks like a card (`2..=10`, `J`, `Q`, `K` or `A`
/// followed by exactly one suit glyph).
///
/// ```
/// use blackjack_client::card::is_card;
///
/// assert!(is_card("10♠"));
/// assert!(is_card("QH"));
/// assert!(!is_card("INPUT"));
/// assert!(!is_card("1♠"));
/// ```
pub fn is_card(token: &str) -> bool {
    split_token(token)
        .and_then(|(rank, _)| rank_value(rank))
        .is_some()
}

/// Point value of a card token.
///
/// Numeral ranks count their face value, court cards count 10 and an ace
/// always counts 11. The dealer is authoritative for hand totals, so this is
/// only used where the peer shows a lone card without a total. Tokens that are
/// not cards count 0.
///
/// ```
/// use blackjack_client::card::card_value;
///
/// assert_eq!(card_value("K♦"), 10);
/// assert_eq!(card_value("A♣"), 11);
/// assert_eq!(card_value("7♥"), 7);
/// ```
pub fn card_value(token: &str) -> u32 {
    split_token(token)
        .and_then(|(rank, _)| rank_value(rank))
        .unwrap_or(0)
}
