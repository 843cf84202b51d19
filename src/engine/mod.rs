//! # Move Selection Engines
//!
//! The scheduler treats an engine as a pure function from a board and the
//! side to move to a cell index. Two implementations ship with the arena:
//!
//! - [`mcts::MctsEngine`] drives player A ('O') with Monte Carlo tree search
//! - [`negamax::NegamaxEngine`] drives player B ('X') with a memoised negamax
//!   search backed by the shared [`PositionCache`]
//!
//! Returning `None` means "no move available" and is not an error.

pub mod mcts;
pub mod negamax;

use crate::cache::PositionCache;
use crate::games::tictactoe::{check_winner, Board, Player};
use std::sync::Arc;

/// The move-selection contract.
pub trait MoveSelector: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Picks a cell for `player` on `board`.
    ///
    /// Engines that do not memoise simply ignore `cache`.
    fn choose_move(&self, board: &Board, player: Player, cache: &PositionCache) -> Option<usize>;
}

/// Returns a cell that completes a line for `player`, if one exists.
pub fn winning_move(board: &Board, player: Player) -> Option<usize> {
    board.empty_cells().find(|&cell| {
        let mut next = *board;
        next.place(cell, player);
        check_winner(&next) == Some(player)
    })
}

/// The engine pair used by the dispatcher, one per side.
#[derive(Clone)]
pub struct Engines {
    a: Arc<dyn MoveSelector>,
    b: Arc<dyn MoveSelector>,
}

impl Engines {
    pub fn new(a: Arc<dyn MoveSelector>, b: Arc<dyn MoveSelector>) -> Self {
        Self { a, b }
    }

    /// MCTS for player A, negamax for player B.
    pub fn standard(mcts_iterations: u32, seed: u64) -> Self {
        Self::new(
            Arc::new(mcts::MctsEngine::new(mcts_iterations, seed)),
            Arc::new(negamax::NegamaxEngine::new(seed)),
        )
    }

    pub fn for_player(&self, player: Player) -> &Arc<dyn MoveSelector> {
        match player {
            Player::A => &self.a,
            Player::B => &self.b,
        }
    }
}
