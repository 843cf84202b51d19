//! # Tic-Tac-Toe Game Implementation
//!
//! The 3x3 board every game in the arena is played on.
//!
//! ## Rules
//! - Player A ('O') always opens, then players alternate
//! - A player owning a full row, column or diagonal wins
//! - A full board without a winning line is a draw

use crate::GameState;
use kxo_shared::{check_line_win, BOARD_SIZE, CELL_A, CELL_B, CELL_EMPTY, N_GRIDS};
use std::fmt;

/// One of the two sides.
///
/// Player A ('O') is driven by the MCTS engine, player B ('X') by negamax.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Player {
    A,
    B,
}

impl Player {
    pub fn other(self) -> Self {
        match self {
            Player::A => Player::B,
            Player::B => Player::A,
        }
    }

    /// Board symbol used by the renderer.
    pub fn symbol(self) -> char {
        match self {
            Player::A => 'O',
            Player::B => 'X',
        }
    }

    /// Dense index, handy for per-player arrays.
    pub fn index(self) -> usize {
        match self {
            Player::A => 0,
            Player::B => 1,
        }
    }

    fn raw(self) -> u8 {
        match self {
            Player::A => CELL_A,
            Player::B => CELL_B,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Tri-state board square.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Cell {
    #[default]
    Empty,
    Taken(Player),
}

/// How a finished board ended.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    Win(Player),
    Draw,
}

/// A 3x3 board stored row-major.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Board {
    cells: [Cell; N_GRIDS],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cell at `idx`, or `None` when out of range.
    pub fn get(&self, idx: usize) -> Option<Cell> {
        self.cells.get(idx).copied()
    }

    /// Places `player` on `idx`.
    ///
    /// # Returns
    /// true if the cell existed and was empty, false otherwise (board unchanged)
    pub fn place(&mut self, idx: usize, player: Player) -> bool {
        match self.cells.get_mut(idx) {
            Some(cell) if *cell == Cell::Empty => {
                *cell = Cell::Taken(player);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.cells = [Cell::Empty; N_GRIDS];
    }

    pub fn cells(&self) -> &[Cell; N_GRIDS] {
        &self.cells
    }

    pub fn empty_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == Cell::Empty)
            .map(|(i, _)| i)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|c| *c == Cell::Empty)
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|c| *c != Cell::Empty)
    }

    /// Number of cells owned by `player`.
    pub fn count(&self, player: Player) -> usize {
        self.cells
            .iter()
            .filter(|c| **c == Cell::Taken(player))
            .count()
    }

    /// Raw byte view in the layout `kxo_shared` expects.
    pub fn raw(&self) -> [u8; N_GRIDS] {
        let mut raw = [CELL_EMPTY; N_GRIDS];
        for (dst, cell) in raw.iter_mut().zip(self.cells.iter()) {
            if let Cell::Taken(p) = cell {
                *dst = p.raw();
            }
        }
        raw
    }

    /// Winner if any, draw if full, `None` while still in play.
    pub fn outcome(&self) -> Option<Outcome> {
        match check_winner(self) {
            Some(p) => Some(Outcome::Win(p)),
            None if self.is_full() => Some(Outcome::Draw),
            None => None,
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..BOARD_SIZE {
            for col in 0..BOARD_SIZE {
                let symbol = match self.cells[row * BOARD_SIZE + col] {
                    Cell::Taken(p) => p.symbol(),
                    Cell::Empty => ' ',
                };
                write!(f, " {}", symbol)?;
                if col + 1 < BOARD_SIZE {
                    write!(f, " |")?;
                }
            }
            writeln!(f)?;
            if row + 1 < BOARD_SIZE {
                writeln!(f, "-----------")?;
            }
        }
        Ok(())
    }
}

/// Returns the player owning a complete line, if any.
pub fn check_winner(board: &Board) -> Option<Player> {
    let raw = board.raw();
    [Player::A, Player::B]
        .into_iter()
        .find(|p| check_line_win(&raw, p.raw()))
}

/// A board together with the side to move, as searched by the engines.
#[derive(Debug, Clone, Copy)]
pub struct TicTacToeState {
    board: Board,
    current_player: Player,
    last_move: Option<usize>,
}

impl TicTacToeState {
    pub fn new(board: Board, to_move: Player) -> Self {
        Self {
            board,
            current_player: to_move,
            last_move: None,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn last_move(&self) -> Option<usize> {
        self.last_move
    }
}

impl GameState for TicTacToeState {
    type Move = usize;
    type Player = Player;

    fn get_possible_moves(&self) -> Vec<Self::Move> {
        if self.board.outcome().is_some() {
            return Vec::new();
        }
        self.board.empty_cells().collect()
    }

    fn make_move(&mut self, mv: &Self::Move) {
        if self.board.place(*mv, self.current_player) {
            self.last_move = Some(*mv);
            self.current_player = self.current_player.other();
        }
    }

    fn is_terminal(&self) -> bool {
        self.board.outcome().is_some()
    }

    fn get_winner(&self) -> Option<Self::Player> {
        check_winner(&self.board)
    }

    fn get_current_player(&self) -> Self::Player {
        self.current_player
    }

    fn other(player: Self::Player) -> Self::Player {
        player.other()
    }
}
