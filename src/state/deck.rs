//! Deterministic shuffling.
//!
//! Both peers build the same deck from the shared seed instead of sending it
//! over the wire. The algorithm is fixed so any implementation can reproduce
//! it:
//!
//! 1. Start from the canonical order: suits Clubs, Diamonds, Hearts, Spades,
//!    ranks 1..=13 within each suit.
//! 2. Seed ChaCha8 with `ChaCha8Rng::seed_from_u64(seed)`.
//! 3. Fisher-Yates from the last index down to 1, swapping `i` with
//!    `j = uniform(0..=i)`. `uniform` draws `next_u64()` and rejects values at
//!    or above the largest multiple of `i + 1`.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::card::{Card, Suit, ACE, DECK_SIZE, KING};

/// The 52 cards in canonical order.
pub fn canonical_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    for suit in Suit::ALL {
        deck.extend((ACE..=KING).filter_map(|rank| Card::new(suit, rank).ok()));
    }
    deck
}

/// Unbiased draw in `0..bound`.
fn uniform(rng: &mut ChaCha8Rng, bound: usize) -> usize {
    let m = bound as u64;
    let limit = u64::MAX - (u64::MAX % m);
    loop {
        let x = rng.next_u64();
        if x < limit {
            return (x % m) as usize;
        }
    }
}

/// Shuffle the canonical deck with `seed`.
pub fn deal(seed: u64) -> Vec<Card> {
    let mut deck = canonical_deck();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for i in (1..deck.len()).rev() {
        let j = uniform(&mut rng, i + 1);
        deck.swap(i, j);
    }
    deck
}
