#![no_std]

//! Primitives shared by the game engine and the event consumers.
//!
//! Everything here works on plain bytes so a consumer can decode the event
//! stream without pulling in the engine.

/// Side length of the board.
pub const BOARD_SIZE: usize = 3;
/// Number of cells on the board.
pub const N_GRIDS: usize = BOARD_SIZE * BOARD_SIZE;
/// Largest pool the wire format can address (game id is 6 bits wide).
pub const MAX_GAMES: usize = 64;
/// Bytes per event on the wire.
pub const EVENT_SIZE: usize = 2;

/// Raw cell value for an empty square.
pub const CELL_EMPTY: u8 = 0;
/// Raw cell value for player A ('O').
pub const CELL_A: u8 = 1;
/// Raw cell value for player B ('X').
pub const CELL_B: u8 = 2;

pub const RESET_FLAG: u8 = 0b1000_0000;
pub const LOAD_FLAG: u8 = 0b0100_0000;
pub const GAME_ID_MASK: u8 = 0b0011_1111;

/// Upper bound of a load percentage byte (200 == 100.0%).
pub const LOAD_SCALE: u8 = 200;

/// Every row, column and diagonal of the board.
pub const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Checks whether `player` owns a complete line.
///
/// # Arguments
/// * `board` - Raw cells, row-major, at least `N_GRIDS` long
/// * `player` - `CELL_A` or `CELL_B`
pub fn check_line_win(board: &[u8], player: u8) -> bool {
    if board.len() < N_GRIDS || player == CELL_EMPTY {
        return false;
    }
    WIN_LINES
        .iter()
        .any(|line| line.iter().all(|&idx| board[idx] == player))
}

/// Encodes a move update. `player_a` is true when player A made the move.
pub fn encode_move(game_id: u8, cell: u8, player_a: bool) -> [u8; EVENT_SIZE] {
    [game_id & GAME_ID_MASK, (cell << 1) | player_a as u8]
}

/// Encodes the pool reset marker.
pub fn encode_reset() -> [u8; EVENT_SIZE] {
    [RESET_FLAG, 0]
}

/// Encodes a load report as the two consecutive events it occupies.
pub fn encode_load(game_id: u8, a_pct: u8, b_pct: u8) -> [u8; 2 * EVENT_SIZE] {
    [
        LOAD_FLAG | (game_id & GAME_ID_MASK),
        a_pct.min(LOAD_SCALE),
        b_pct.min(LOAD_SCALE),
        0,
    ]
}

/// A fully decoded message from the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Move { game_id: u8, cell: u8, player_a: bool },
    Load { game_id: u8, a_pct: u8, b_pct: u8 },
    Reset,
}

/// Stateful decoder turning 2-byte frames into messages.
///
/// A load report spans two frames, and the second frame carries no tag, so
/// the decoder has to remember that it is in the middle of one.
#[derive(Debug, Default, Clone)]
pub struct FrameDecoder {
    pending_load: Option<(u8, u8)>,
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self { pending_load: None }
    }

    /// Feeds one frame. Returns `None` while a load report is half read.
    pub fn feed(&mut self, frame: [u8; EVENT_SIZE]) -> Option<Message> {
        if let Some((game_id, a_pct)) = self.pending_load.take() {
            return Some(Message::Load {
                game_id,
                a_pct,
                b_pct: frame[0].min(LOAD_SCALE),
            });
        }
        let head = frame[0];
        if head & RESET_FLAG != 0 {
            return Some(Message::Reset);
        }
        if head & LOAD_FLAG != 0 {
            self.pending_load = Some((head & GAME_ID_MASK, frame[1].min(LOAD_SCALE)));
            return None;
        }
        Some(Message::Move {
            game_id: head & GAME_ID_MASK,
            cell: frame[1] >> 1,
            player_a: frame[1] & 1 == 1,
        })
    }

    /// True while the first half of a load report is buffered.
    pub fn is_mid_report(&self) -> bool {
        self.pending_load.is_some()
    }
}
