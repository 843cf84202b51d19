//! # kxo
//!
//! A pool of tic-tac-toe games played automatically between two engines.
//! A periodic ticker folds per-player CPU load and runs a dispatch pass that
//! hands every owed move to a worker pool. Workers apply moves under a
//! per-game lock and publish compact 2-byte records to a bounded event
//! queue, which a single reader drains through a [`arena::Session`].
//!
//! ## Layout
//! - [`games::tictactoe`]: board, players and win detection
//! - [`engine`]: the MCTS (player A) and negamax (player B) move selectors
//! - [`cache`]: Zobrist keys and the shared position cache
//! - [`table`]: the game pool, per-game locks and the decided counter
//! - [`events`]: the byte-oriented event queue
//! - [`load`]: fixed-point load averages
//! - [`control`]: the display / resume / stop flags
//! - [`dispatch`], [`ticker`], [`arena`]: scheduling and session lifecycle
//! - [`viewer`]: stream decoding and board rendering for the `kxo` binary

pub mod arena;
pub mod cache;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod games;
pub mod load;
pub mod stats;
pub mod table;
pub mod ticker;
pub mod viewer;

pub use arena::{Arena, Session};
pub use config::Config;
pub use error::{KxoError, Result};
pub use events::ReadMode;

/// The state of a game. Must be cloneable to be used in the MCTS.
/// `Send` and `Sync` are required so a search can be shared between threads.
pub trait GameState: Clone + Send + Sync {
    /// The type of a move in the game.
    type Move: Clone + Eq + std::hash::Hash + std::fmt::Debug + Send + Sync;
    /// The type identifying a side.
    type Player: Copy + Eq + std::fmt::Debug + Send + Sync;

    /// Returns a vector of all possible moves from the current state.
    fn get_possible_moves(&self) -> Vec<Self::Move>;
    /// Applies a move to the state, modifying it.
    fn make_move(&mut self, mv: &Self::Move);
    /// Returns true if the game is over.
    fn is_terminal(&self) -> bool;
    /// Returns the winner of the game, if any.
    /// `None` for a draw or if the game is not over.
    fn get_winner(&self) -> Option<Self::Player>;
    /// Returns the player whose turn it is to move.
    fn get_current_player(&self) -> Self::Player;
    /// Returns the opponent of `player`.
    fn other(player: Self::Player) -> Self::Player;
}
