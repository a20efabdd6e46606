//! Per-side player state and move rules.
//!
//! A player never owns stacks; it addresses its five tableau columns and
//! draw pile on the [`Board`] by [`StackId`]. Two move kinds exist:
//!
//! - **Tableau → Foundation**: the selected column top must be rank-adjacent
//!   (see [`distance`]) to the foundation top.
//! - **Tableau → Tableau**: consolidation into an empty column of the same
//!   side, from a column holding more than one card.
//!
//! Draw-pile cards only reach the foundations through the recovery cycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::board::{Board, BoardError, Side, StackId};
use super::card::{distance, Card};

/// Why a requested move was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IllegalMove {
    #[error("player is locked")]
    Locked,
    #[error("nothing selected")]
    NothingSelected,
    #[error("{0} is not one of the player's non-empty columns")]
    NotOwnColumn(StackId),
    #[error("selection is stale; the column top changed")]
    StaleSelection,
    #[error("{0} is not a foundation")]
    NotFoundation(StackId),
    #[error("{card} is not adjacent to {target}")]
    NotAdjacent { card: Card, target: Card },
    #[error("{0} is not empty")]
    DestinationOccupied(StackId),
    #[error("{0} has no reserve cards to consolidate")]
    NoReserve(StackId),
    #[error("source and destination are the same column")]
    SameColumn,
    #[error(transparent)]
    Board(#[from] BoardError),
}

/// A card picked up and waiting for a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub stack: StackId,
    pub card: Card,
}

/// An applied move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub from: StackId,
    pub to: StackId,
    pub card: Card,
}

/// First move found by the can-act scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveHint {
    Consolidate { from: StackId, to: StackId },
    ToFoundation { from: StackId, foundation: StackId },
}

impl MoveHint {
    pub fn endpoints(&self) -> (StackId, StackId) {
        match *self {
            Self::Consolidate { from, to } => (from, to),
            Self::ToFoundation { from, foundation } => (from, foundation),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub side: Side,
    selection: Option<Selection>,
    pub is_ready: bool,
    pub is_locked: bool,
    can_act: bool,
}

impl Player {
    /// Players start locked until the deal finishes.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            selection: None,
            is_ready: false,
            is_locked: true,
            can_act: false,
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn can_act(&self) -> bool {
        self.can_act
    }

    pub fn owns(&self, id: StackId) -> bool {
        id.owner() == Some(self.side)
    }

    pub fn lock(&mut self) {
        self.is_locked = true;
        self.selection = None;
    }

    pub fn unlock(&mut self) {
        self.is_locked = false;
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Pick up the top card of one of this player's columns. A refused
    /// selection drops whatever was held before.
    pub fn select(&mut self, board: &Board, stack: StackId) -> Result<Selection, IllegalMove> {
        self.selection = None;
        if self.is_locked {
            return Err(IllegalMove::Locked);
        }
        let card = match board.stack(stack)?.peek_top() {
            Some(card) if stack.is_tableau() && self.owns(stack) => *card,
            _ => return Err(IllegalMove::NotOwnColumn(stack)),
        };
        let selection = Selection { stack, card };
        self.selection = Some(selection);
        Ok(selection)
    }

    /// Play the current selection onto `to`, a foundation or an empty column.
    ///
    /// The selection is cleared whether or not the move is accepted.
    pub fn play_selected(&mut self, board: &mut Board, to: StackId) -> Result<Move, IllegalMove> {
        let selection = self.selection.take().ok_or(IllegalMove::NothingSelected)?;
        if self.is_locked {
            return Err(IllegalMove::Locked);
        }
        board.stack(to)?;
        if board.stack(selection.stack)?.peek_top() != Some(&selection.card) {
            return Err(IllegalMove::StaleSelection);
        }

        match to {
            StackId::Foundation(_) => self.check_foundation(board, &selection, to)?,
            StackId::Tableau(..) => self.check_consolidation(board, &selection, to)?,
            other => return Err(IllegalMove::NotFoundation(other)),
        }

        let card = board.move_top(selection.stack, to)?;
        Ok(Move {
            from: selection.stack,
            to,
            card,
        })
    }

    fn check_foundation(
        &self,
        board: &Board,
        selection: &Selection,
        foundation: StackId,
    ) -> Result<(), IllegalMove> {
        let target = board
            .stack(foundation)?
            .peek_top()
            .ok_or(BoardError::EmptyStack(foundation))?;
        if distance(&selection.card, target) != 1 {
            return Err(IllegalMove::NotAdjacent {
                card: selection.card,
                target: *target,
            });
        }
        Ok(())
    }

    fn check_consolidation(
        &self,
        board: &Board,
        selection: &Selection,
        dest: StackId,
    ) -> Result<(), IllegalMove> {
        if !self.owns(dest) {
            return Err(IllegalMove::NotOwnColumn(dest));
        }
        if dest == selection.stack {
            return Err(IllegalMove::SameColumn);
        }
        if !board.stack(dest)?.is_empty() {
            return Err(IllegalMove::DestinationOccupied(dest));
        }
        if board.stack(selection.stack)?.count() < 2 {
            return Err(IllegalMove::NoReserve(selection.stack));
        }
        Ok(())
    }

    /// First available move, scanning consolidations before foundation plays.
    pub fn hint(&self, board: &Board) -> Option<MoveHint> {
        let reserve = board.columns(self.side).find(|(_, s)| s.count() > 1);
        let empty = board.columns(self.side).find(|(_, s)| s.is_empty());
        if let (Some((from, _)), Some((to, _))) = (reserve, empty) {
            return Some(MoveHint::Consolidate { from, to });
        }

        for (column, stack) in board.columns(self.side) {
            let Some(top) = stack.peek_top() else {
                continue;
            };
            for (foundation, pile) in board.foundations() {
                let adjacent = pile
                    .peek_top()
                    .is_some_and(|target| distance(top, target) == 1);
                if adjacent {
                    return Some(MoveHint::ToFoundation {
                        from: column,
                        foundation,
                    });
                }
            }
        }

        None
    }

    /// Recompute and store the can-act flag.
    pub fn refresh_can_act(&mut self, board: &Board) -> bool {
        self.can_act = self.hint(board).is_some();
        self.can_act
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::card::Suit;
    use crate::state::config::MatchConfig;
    use crate::state::stack::Stack;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn card(rank: u8) -> Card {
        Card::new(Suit::Clubs, rank).unwrap()
    }

    fn fill(stack: &mut Stack, ranks: &[u8]) {
        while stack.pop().is_ok() {}
        for &rank in ranks {
            stack.push(card(rank));
        }
    }

    /// Board with side 0's columns and both foundations set explicitly.
    fn position(columns: [&[u8]; 5], foundations: [u8; 2]) -> Board {
        let mut board = Board::new(&MatchConfig::default());
        for (i, ranks) in columns.iter().enumerate() {
            fill(board.stack_for_test(StackId::Tableau(Side::First, i)), ranks);
        }
        for (i, rank) in foundations.iter().enumerate() {
            fill(board.stack_for_test(StackId::Foundation(i)), &[*rank]);
        }
        board
    }

    fn unlocked() -> Player {
        let mut player = Player::new(Side::First);
        player.unlock();
        player
    }

    #[test]
    fn test_play_adjacent_to_foundation() {
        let mut board = position([&[2, 5], &[8], &[8], &[8], &[8]], [4, 11]);
        let mut player = unlocked();

        player.select(&board, StackId::Tableau(Side::First, 0)).unwrap();
        let mv = player
            .play_selected(&mut board, StackId::Foundation(0))
            .unwrap();

        assert_eq!(mv.card, card(5));
        assert_eq!(board.foundation(0).unwrap().peek_top(), Some(&card(5)));
        assert_eq!(board.stack(StackId::Tableau(Side::First, 0)).unwrap().count(), 1);
        assert!(player.selection().is_none());
    }

    #[test]
    fn test_non_adjacent_rejected_without_mutation() {
        let mut board = position([&[2, 5], &[8], &[8], &[8], &[8]], [9, 11]);
        let before = board.clone();
        let mut player = unlocked();

        player.select(&board, StackId::Tableau(Side::First, 0)).unwrap();
        let result = player.play_selected(&mut board, StackId::Foundation(0));

        assert_eq!(
            result,
            Err(IllegalMove::NotAdjacent {
                card: card(5),
                target: card(9)
            })
        );
        assert_eq!(board, before);
        assert!(player.selection().is_none());
    }

    #[test]
    fn test_king_onto_ace() {
        let mut board = position([&[13], &[8], &[8], &[8], &[8]], [6, 1]);
        let mut player = unlocked();
        player.select(&board, StackId::Tableau(Side::First, 0)).unwrap();
        assert!(player.play_selected(&mut board, StackId::Foundation(1)).is_ok());
    }

    #[test]
    fn test_consolidation_rules() {
        let mut board = position([&[3, 7], &[], &[9], &[9], &[9]], [12, 12]);
        let mut player = unlocked();

        // Single card cannot consolidate
        player.select(&board, StackId::Tableau(Side::First, 2)).unwrap();
        assert_eq!(
            player.play_selected(&mut board, StackId::Tableau(Side::First, 1)),
            Err(IllegalMove::NoReserve(StackId::Tableau(Side::First, 2)))
        );

        // Occupied destination
        player.select(&board, StackId::Tableau(Side::First, 0)).unwrap();
        assert_eq!(
            player.play_selected(&mut board, StackId::Tableau(Side::First, 3)),
            Err(IllegalMove::DestinationOccupied(StackId::Tableau(Side::First, 3)))
        );

        // Opponent column
        player.select(&board, StackId::Tableau(Side::First, 0)).unwrap();
        assert_eq!(
            player.play_selected(&mut board, StackId::Tableau(Side::Second, 1)),
            Err(IllegalMove::NotOwnColumn(StackId::Tableau(Side::Second, 1)))
        );

        player.select(&board, StackId::Tableau(Side::First, 0)).unwrap();
        let mv = player
            .play_selected(&mut board, StackId::Tableau(Side::First, 1))
            .unwrap();
        assert_eq!(mv.card, card(7));
        assert_eq!(
            board.stack(StackId::Tableau(Side::First, 0)).unwrap().cards(),
            &[card(3)]
        );
    }

    #[test]
    fn test_select_rules() {
        let board = position([&[3], &[], &[9], &[9], &[9]], [12, 12]);
        let mut player = Player::new(Side::First);

        assert_eq!(
            player.select(&board, StackId::Tableau(Side::First, 0)),
            Err(IllegalMove::Locked)
        );

        player.unlock();
        assert_eq!(
            player.select(&board, StackId::Tableau(Side::First, 1)),
            Err(IllegalMove::NotOwnColumn(StackId::Tableau(Side::First, 1)))
        );
        assert_eq!(
            player.select(&board, StackId::Foundation(0)),
            Err(IllegalMove::NotOwnColumn(StackId::Foundation(0)))
        );
        assert!(player.select(&board, StackId::Tableau(Side::First, 0)).is_ok());
    }

    #[test]
    fn test_refused_select_drops_previous_selection() {
        let board = position([&[3], &[], &[9], &[9], &[9]], [12, 12]);
        let mut player = unlocked();

        player.select(&board, StackId::Tableau(Side::First, 0)).unwrap();
        assert_eq!(
            player.select(&board, StackId::Tableau(Side::Second, 0)),
            Err(IllegalMove::NotOwnColumn(StackId::Tableau(Side::Second, 0)))
        );
        assert!(player.selection().is_none());
        assert_eq!(
            player.play_selected(&mut board.clone(), StackId::Foundation(0)),
            Err(IllegalMove::NothingSelected)
        );
    }

    #[test]
    fn test_hint_prefers_consolidation() {
        // A foundation play exists too, but consolidation is found first
        let board = position([&[2, 5], &[], &[8], &[8], &[8]], [4, 11]);
        let player = unlocked();
        assert_eq!(
            player.hint(&board),
            Some(MoveHint::Consolidate {
                from: StackId::Tableau(Side::First, 0),
                to: StackId::Tableau(Side::First, 1),
            })
        );
    }

    #[test]
    fn test_hint_foundation_scan_order() {
        let board = position([&[8], &[10], &[12], &[9], &[9]], [11, 1]);
        let player = unlocked();
        assert_eq!(
            player.hint(&board),
            Some(MoveHint::ToFoundation {
                from: StackId::Tableau(Side::First, 1),
                foundation: StackId::Foundation(0),
            })
        );
    }

    #[test]
    fn test_isolated_singletons_cannot_act() {
        let board = position([&[5], &[], &[5], &[], &[5]], [9, 9]);
        let mut player = unlocked();
        assert!(!player.refresh_can_act(&board));
        assert!(!player.can_act());
    }

    #[test]
    fn test_lock_clears_selection() {
        let board = position([&[5], &[5], &[5], &[5], &[5]], [9, 9]);
        let mut player = unlocked();
        player.select(&board, StackId::Tableau(Side::First, 0)).unwrap();
        player.lock();
        assert!(player.selection().is_none());
    }

    fn column_strategy() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(1u8..=13, 0..4)
    }

    proptest! {
        /// can-act is true exactly when some legal move exists.
        #[test]
        fn prop_can_act_sound(
            columns in prop::collection::vec(column_strategy(), 5),
            foundations in (1u8..=13, 1u8..=13),
        ) {
            let refs: Vec<&[u8]> = columns.iter().map(|c| c.as_slice()).collect();
            let board = position(
                [refs[0], refs[1], refs[2], refs[3], refs[4]],
                [foundations.0, foundations.1],
            );
            let mut player = unlocked();
            let can_act = player.refresh_can_act(&board);

            let mut any_legal = false;
            let targets: Vec<StackId> = Board::column_ids(Side::First)
                .chain(Board::foundation_ids())
                .collect();
            for from in Board::column_ids(Side::First) {
                for &to in &targets {
                    let mut scratch = board.clone();
                    let mut probe = unlocked();
                    if probe.select(&scratch, from).is_ok()
                        && probe.play_selected(&mut scratch, to).is_ok()
                    {
                        any_legal = true;
                    }
                }
            }
            prop_assert_eq!(can_act, any_legal);
        }
    }
}
