//! Board topology and dealing.
//!
//! The board owns every stack in a match. Stacks are addressed by
//! [`StackId`], whose numeric index is stable across peers and is what move
//! messages carry on the wire:
//!
//! ```text
//!  index   stack
//!  ─────   ──────────────────────────
//!    0     main deck (empty after the deal)
//!   1-2    draw pile, side 0 / side 1
//!   3-4    foundation 0 / foundation 1 (shared)
//!   5-9    tableau columns of side 0
//!  10-14   tableau columns of side 1
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use super::card::{Card, DECK_SIZE};
use super::config::MatchConfig;
use super::deck;
use super::stack::{Stack, StackError};

/// Tableau columns per side.
pub const COLUMNS_PER_SIDE: usize = 5;

/// Shared foundation piles.
pub const FOUNDATION_COUNT: usize = 2;

/// Cards in each draw pile right after the split.
pub const DRAW_PILE_SIZE: usize = DECK_SIZE / 2;

/// Number of addressable stacks.
pub const STACK_COUNT: usize = 1 + 2 + FOUNDATION_COUNT + 2 * COLUMNS_PER_SIDE;

/// One of the two players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    First,
    Second,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::First, Side::Second];

    pub fn index(&self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::First),
            1 => Some(Self::Second),
            _ => None,
        }
    }

    pub fn opponent(&self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }

    /// Foundation reseeded from this side's draw pile.
    pub fn foundation(&self) -> usize {
        self.index()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "side{}", self.index())
    }
}

/// Logical address of a stack on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StackId {
    MainDeck,
    DrawPile(Side),
    Foundation(usize),
    Tableau(Side, usize),
}

impl StackId {
    /// Stable wire index. Only ids for which [`StackId::is_valid`] holds
    /// round-trip through [`StackId::from_index`].
    pub fn index(&self) -> u8 {
        let index = match self {
            Self::MainDeck => 0,
            Self::DrawPile(side) => 1 + side.index(),
            Self::Foundation(f) => 3 + f,
            Self::Tableau(side, column) => 5 + side.index() * COLUMNS_PER_SIDE + column,
        };
        index as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        let index = index as usize;
        match index {
            0 => Some(Self::MainDeck),
            1..=2 => Side::from_index(index - 1).map(Self::DrawPile),
            3..=4 => Some(Self::Foundation(index - 3)),
            5..=14 => {
                let offset = index - 5;
                Side::from_index(offset / COLUMNS_PER_SIDE)
                    .map(|side| Self::Tableau(side, offset % COLUMNS_PER_SIDE))
            }
            _ => None,
        }
    }

    /// Side that exclusively mutates this stack, if any.
    pub fn owner(&self) -> Option<Side> {
        match self {
            Self::DrawPile(side) | Self::Tableau(side, _) => Some(*side),
            Self::MainDeck | Self::Foundation(_) => None,
        }
    }

    pub fn is_tableau(&self) -> bool {
        matches!(self, Self::Tableau(..))
    }

    pub fn is_foundation(&self) -> bool {
        matches!(self, Self::Foundation(_))
    }

    /// True when the id addresses a stack that exists.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Foundation(f) => *f < FOUNDATION_COUNT,
            Self::Tableau(_, column) => *column < COLUMNS_PER_SIDE,
            _ => true,
        }
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MainDeck => write!(f, "main_deck"),
            Self::DrawPile(side) => write!(f, "draw_pile[{}]", side.index()),
            Self::Foundation(i) => write!(f, "foundation[{}]", i),
            Self::Tableau(side, column) => write!(f, "tableau[{}][{}]", side.index(), column),
        }
    }
}

/// Board errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("no stack at index {0}")]
    UnknownStack(u8),
    #[error("{0} is not on the board")]
    InvalidStack(StackId),
    #[error("source and destination are both {0}")]
    SameStack(StackId),
    #[error("{0} is empty")]
    EmptyStack(StackId),
}

/// All stacks of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    stacks: Vec<Stack>,
}

impl Board {
    /// Empty board laid out for `config`.
    pub fn new(config: &MatchConfig) -> Self {
        let mut stacks = Vec::with_capacity(STACK_COUNT);
        stacks.push(Stack::new());
        stacks.extend(Side::ALL.iter().map(|_| Stack::new()));
        stacks.extend((0..FOUNDATION_COUNT).map(|_| Stack::new().revealed()));
        for _ in Side::ALL {
            stacks.extend(
                (0..COLUMNS_PER_SIDE).map(|_| Stack::bounded(config.column_capacity).revealed()),
            );
        }
        Self { stacks }
    }

    /// Board after the full deal for `seed`.
    pub fn dealt(seed: u64, config: &MatchConfig) -> Result<Self, BoardError> {
        let mut board = Self::new(config);
        board.load_deck(deck::deal(seed));
        board.deal_draw_piles()?;
        for side in Side::ALL {
            board.deal_tableau(side)?;
        }
        board.seed_foundations()?;
        Ok(board)
    }

    /// Look up a stack, refusing ids that address nothing.
    pub fn stack(&self, id: StackId) -> Result<&Stack, BoardError> {
        if !id.is_valid() {
            return Err(BoardError::InvalidStack(id));
        }
        Ok(self.slot(id))
    }

    /// Callers pass only ids built from `Side` and the fixed column and
    /// foundation ranges.
    fn slot(&self, id: StackId) -> &Stack {
        &self.stacks[id.index() as usize]
    }

    fn slot_mut(&mut self, id: StackId) -> &mut Stack {
        &mut self.stacks[id.index() as usize]
    }

    /// Resolve a wire index.
    pub fn resolve(&self, index: u8) -> Result<StackId, BoardError> {
        StackId::from_index(index).ok_or(BoardError::UnknownStack(index))
    }

    pub fn main_deck(&self) -> &Stack {
        self.slot(StackId::MainDeck)
    }

    pub fn draw_pile(&self, side: Side) -> &Stack {
        self.slot(StackId::DrawPile(side))
    }

    pub fn foundation(&self, index: usize) -> Option<&Stack> {
        self.stack(StackId::Foundation(index)).ok()
    }

    /// A side's columns with their ids, left to right.
    pub fn columns(&self, side: Side) -> impl Iterator<Item = (StackId, &Stack)> + '_ {
        Self::column_ids(side).map(move |id| (id, self.slot(id)))
    }

    pub fn foundations(&self) -> impl Iterator<Item = (StackId, &Stack)> + '_ {
        Self::foundation_ids().map(move |id| (id, self.slot(id)))
    }

    /// Column ids of one side, left to right.
    pub fn column_ids(side: Side) -> impl Iterator<Item = StackId> {
        (0..COLUMNS_PER_SIDE).map(move |column| StackId::Tableau(side, column))
    }

    pub fn foundation_ids() -> impl Iterator<Item = StackId> {
        (0..FOUNDATION_COUNT).map(StackId::Foundation)
    }

    /// Total cards across a side's tableau.
    pub fn tableau_count(&self, side: Side) -> usize {
        self.columns(side).map(|(_, stack)| stack.count()).sum()
    }

    /// Cards across every stack. Always 52 once the deck is loaded.
    pub fn total_cards(&self) -> usize {
        self.stacks.iter().map(Stack::count).sum()
    }

    /// Move the top of `from` onto `to`.
    pub fn move_top(&mut self, from: StackId, to: StackId) -> Result<Card, BoardError> {
        if !from.is_valid() {
            return Err(BoardError::InvalidStack(from));
        }
        if !to.is_valid() {
            return Err(BoardError::InvalidStack(to));
        }
        if from == to {
            return Err(BoardError::SameStack(from));
        }

        let (a, b) = (from.index() as usize, to.index() as usize);
        let (source, dest) = if a < b {
            let (lo, hi) = self.stacks.split_at_mut(b);
            (&mut lo[a], &mut hi[0])
        } else {
            let (lo, hi) = self.stacks.split_at_mut(a);
            (&mut hi[0], &mut lo[b])
        };

        source.move_top_to(dest).map_err(|e| match e {
            StackError::Empty => BoardError::EmptyStack(from),
        })
    }

    /// Put a shuffled deck on the main deck. The first card ends up at the bottom.
    pub fn load_deck(&mut self, cards: Vec<Card>) {
        let main = self.slot_mut(StackId::MainDeck);
        for card in cards {
            main.push(card);
        }
    }

    /// Split the main deck one card at a time, side 0 first.
    pub fn deal_draw_piles(&mut self) -> Result<(), BoardError> {
        let mut side = Side::First;
        while !self.main_deck().is_empty() {
            self.move_top(StackId::MainDeck, StackId::DrawPile(side))?;
            side = side.opponent();
        }
        Ok(())
    }

    /// Deal from a side's draw pile into its columns, round-robin, until
    /// every column is full.
    pub fn deal_tableau(&mut self, side: Side) -> Result<(), BoardError> {
        loop {
            let mut dealt = false;
            for column in Self::column_ids(side) {
                if self.slot(column).is_full() {
                    continue;
                }
                self.move_top(StackId::DrawPile(side), column)
                    .inspect_err(|e| error!(%side, error = %e, "draw pile ran out while dealing"))?;
                dealt = true;
            }
            if !dealt {
                return Ok(());
            }
        }
    }

    /// Opening foundation cards, one from each draw pile.
    pub fn seed_foundations(&mut self) -> Result<(), BoardError> {
        for side in Side::ALL {
            self.move_top(
                StackId::DrawPile(side),
                StackId::Foundation(side.foundation()),
            )?;
        }
        Ok(())
    }

    /// Move each non-empty draw pile's top onto its side's foundation.
    /// Returns the sides that contributed a card.
    pub fn reseed_foundations(&mut self) -> Result<Vec<Side>, BoardError> {
        let mut reseeded = Vec::new();
        for side in Side::ALL {
            if self.draw_pile(side).is_empty() {
                continue;
            }
            let card = self.move_top(
                StackId::DrawPile(side),
                StackId::Foundation(side.foundation()),
            )?;
            debug!(%side, %card, "foundation reseeded");
            reseeded.push(side);
        }
        Ok(reseeded)
    }

    /// Raw access for building specific positions in tests.
    #[cfg(test)]
    pub(crate) fn stack_for_test(&mut self, id: StackId) -> &mut Stack {
        self.slot_mut(id)
    }
}
