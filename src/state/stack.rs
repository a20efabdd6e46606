//! LIFO card stacks.
//!
//! Every pile on the board is a [`Stack`]. Cards only ever change stacks
//! through [`Stack::move_top_to`], so the total number of cards on a board
//! never changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::card::Card;

/// Stack errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("pop from an empty stack")]
    Empty,
}

/// An ordered pile of cards. The last element is the top.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    cards: Vec<Card>,

    /// Deal threshold; `None` means unbounded
    capacity: Option<usize>,

    /// Whether the top card is shown face-up. Never affects legality.
    pub reveal_top: bool,
}

impl Stack {
    /// Unbounded, face-down stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stack that counts as full once it holds `capacity` cards.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn revealed(mut self) -> Self {
        self.reveal_top = true;
        self
    }

    pub fn push(&mut self, card: Card) {
        self.cards.push(card);
    }

    pub fn pop(&mut self) -> Result<Card, StackError> {
        self.cards.pop().ok_or(StackError::Empty)
    }

    pub fn peek_top(&self) -> Option<&Card> {
        self.cards.last()
    }

    /// Top card only if it is face-up.
    pub fn visible_top(&self) -> Option<&Card> {
        if self.reveal_top {
            self.peek_top()
        } else {
            None
        }
    }

    pub fn count(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Only meaningful for bounded stacks; unbounded stacks are never full.
    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.cards.len() >= cap)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Cards bottom to top.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Pop the top card and push it onto `other`.
    pub fn move_top_to(&mut self, other: &mut Stack) -> Result<Card, StackError> {
        let card = self.pop()?;
        other.push(card);
        Ok(card)
    }
}
