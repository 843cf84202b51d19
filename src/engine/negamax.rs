//! # Negamax Engine
//!
//! Player B's engine: a full-depth negamax with alpha-beta pruning.
//! Exact results are memoised in the shared [`PositionCache`], keyed by the
//! Zobrist hash of the board and the side to move.
//!
//! Scores are intrinsic to a position (a win is worth more the more cells are
//! still empty), never to the depth of the search that found them, so an
//! entry stays valid whichever root reached it.

use super::MoveSelector;
use crate::cache::{PositionCache, ZobristKeys};
use crate::games::tictactoe::{check_winner, Board, Player};

/// Base score of a decided win.
pub const WIN_SCORE: i32 = 100;

pub struct NegamaxEngine {
    keys: ZobristKeys,
}

impl NegamaxEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            keys: ZobristKeys::new(seed),
        }
    }

    /// Best score and move for `to_move`, from `to_move`'s point of view.
    pub fn evaluate(
        &self,
        board: &Board,
        to_move: Player,
        cache: &PositionCache,
    ) -> (i32, Option<usize>) {
        self.negamax(board, to_move, -WIN_SCORE * 2, WIN_SCORE * 2, cache)
    }

    fn negamax(
        &self,
        board: &Board,
        to_move: Player,
        mut alpha: i32,
        beta: i32,
        cache: &PositionCache,
    ) -> (i32, Option<usize>) {
        let empties = board.empty_cells().count() as i32;
        if check_winner(board).is_some() {
            // Only the player who just moved can own a line.
            return (-(WIN_SCORE + empties), None);
        }
        if empties == 0 {
            return (0, None);
        }

        let key = self.keys.hash(board, to_move);
        if let Some(entry) = cache.lookup(key) {
            return (entry.score, entry.best_move);
        }

        let alpha_orig = alpha;
        let mut best_score = i32::MIN;
        let mut best_move = None;
        let moves: Vec<usize> = board.empty_cells().collect();
        for cell in moves {
            let mut child = *board;
            child.place(cell, to_move);
            let (score, _) = self.negamax(&child, to_move.other(), -beta, -alpha, cache);
            let score = -score;
            if score > best_score {
                best_score = score;
                best_move = Some(cell);
            }
            alpha = alpha.max(score);
            if alpha >= beta {
                break;
            }
        }

        // Only scores inside the initial window are exact.
        if best_score > alpha_orig && best_score < beta {
            cache.store(key, best_score, best_move);
        }
        (best_score, best_move)
    }
}

impl MoveSelector for NegamaxEngine {
    fn name(&self) -> &'static str {
        "negamax"
    }

    fn choose_move(&self, board: &Board, player: Player, cache: &PositionCache) -> Option<usize> {
        if board.outcome().is_some() {
            return None;
        }
        self.evaluate(board, player, cache).1
    }
}
