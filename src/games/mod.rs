//! # Game Implementations
//!
//! The arena plays a single game: 3x3 tic-tac-toe between player A ('O')
//! and player B ('X'). [`tictactoe::TicTacToeState`] implements the
//! `GameState` trait so the tree search can run over it.

pub mod tictactoe;
