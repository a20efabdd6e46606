//! Cards and the rank comparator.
//!
//! A card is an immutable `(suit, rank)` pair with ranks 1 (Ace) through
//! 13 (King). The only legality primitive in the game is [`distance`], the
//! circular rank distance with Ace/King wraparound.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest rank (Ace).
pub const ACE: u8 = 1;

/// Highest rank (King).
pub const KING: u8 = 13;

/// Cards in a full deck.
pub const DECK_SIZE: usize = 52;

/// Card suits, in canonical deck order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];

    pub fn as_char(&self) -> char {
        match self {
            Self::Clubs => 'C',
            Self::Diamonds => 'D',
            Self::Hearts => 'H',
            Self::Spades => 'S',
        }
    }
}

/// Error building a card from raw parts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rank {0} is outside 1..=13")]
pub struct InvalidRank(pub u8);

/// A playing card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    suit: Suit,
    rank: u8,
}

impl Card {
    /// Create a card, rejecting ranks outside 1..=13.
    pub fn new(suit: Suit, rank: u8) -> Result<Self, InvalidRank> {
        if !(ACE..=KING).contains(&rank) {
            return Err(InvalidRank(rank));
        }
        Ok(Self { suit, rank })
    }

    pub fn suit(&self) -> Suit {
        self.suit
    }

    pub fn rank(&self) -> u8 {
        self.rank
    }

    /// Face identifier, e.g. `"AS"`, `"10H"`, `"KD"`.
    pub fn face(&self) -> String {
        self.to_string()
    }

    /// Position of this card in the canonical deck (0..52).
    pub fn ordinal(&self) -> usize {
        self.suit as usize * KING as usize + (self.rank as usize - 1)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rank = match self.rank {
            1 => "A".to_string(),
            11 => "J".to_string(),
            12 => "Q".to_string(),
            13 => "K".to_string(),
            n => n.to_string(),
        };
        write!(f, "{}{}", rank, self.suit.as_char())
    }
}

/// Circular rank distance between two cards.
///
/// Ace and King are one step apart; every other pair is the absolute
/// difference of their ranks.
pub fn distance(a: &Card, b: &Card) -> u8 {
    let (lo, hi) = if a.rank <= b.rank {
        (a.rank, b.rank)
    } else {
        (b.rank, a.rank)
    };
    if lo == ACE && hi == KING {
        1
    } else {
        hi - lo
    }
}

/// True when `a` may land on `b` (or vice versa).
pub fn is_adjacent(a: &Card, b: &Card) -> bool {
    distance(a, b) == 1
}
