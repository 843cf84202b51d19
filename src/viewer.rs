//! # Event Stream Viewer
//!
//! Consumer-side helpers for the `kxo` binary: [`StreamDecoder`] rebuilds
//! messages from arbitrary read chunks and [`BoardView`] keeps what the
//! terminal shows (boards, move logs and load figures per game).

use crate::games::tictactoe::{Board, Player};
use crate::stats::StatsSnapshot;
use colored::Colorize;
use kxo_shared::{FrameDecoder, Message, BOARD_SIZE, EVENT_SIZE};
use std::fmt::Write;

/// Reassembles 2-byte frames from reads that may split them.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    carry: Option<u8>,
    frames: FrameDecoder,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one read worth of bytes. An empty chunk is "no data".
    pub fn feed(&mut self, mut bytes: &[u8]) -> Vec<Message> {
        let mut out = Vec::with_capacity(bytes.len() / EVENT_SIZE + 1);
        if let Some(first) = self.carry {
            let Some((&second, rest)) = bytes.split_first() else {
                return out;
            };
            self.carry = None;
            out.extend(self.frames.feed([first, second]));
            bytes = rest;
        }
        let mut chunks = bytes.chunks_exact(EVENT_SIZE);
        for frame in &mut chunks {
            out.extend(self.frames.feed([frame[0], frame[1]]));
        }
        if let [last] = chunks.remainder() {
            self.carry = Some(*last);
        }
        out
    }

    /// True while a frame or a load report is only partly received.
    pub fn is_partial(&self) -> bool {
        self.carry.is_some() || self.frames.is_mid_report()
    }
}

/// `A1`-style label: row letter, then column number.
pub fn cell_label(cell: usize) -> String {
    let row = (cell / BOARD_SIZE) as u8;
    let col = (cell % BOARD_SIZE) as u8;
    format!("{}{}", (b'A' + row) as char, (b'1' + col) as char)
}

#[derive(Debug, Clone, Default)]
struct GameView {
    board: Board,
    moves: Vec<String>,
    /// Load in tenths of a percent, per player.
    load: [u16; 2],
}

/// What the terminal shows, rebuilt from the event stream.
#[derive(Debug, Clone)]
pub struct BoardView {
    games: Vec<GameView>,
    resets: u64,
}

impl BoardView {
    pub fn new(games: usize) -> Self {
        Self {
            games: vec![GameView::default(); games],
            resets: 0,
        }
    }

    pub fn apply(&mut self, message: Message) {
        match message {
            Message::Reset => {
                for game in &mut self.games {
                    game.board.clear();
                    game.moves.clear();
                }
                self.resets += 1;
            }
            Message::Move {
                game_id,
                cell,
                player_a,
            } => {
                let Some(game) = self.games.get_mut(game_id as usize) else {
                    return;
                };
                let player = if player_a { Player::A } else { Player::B };
                let cell = cell as usize;
                if game.board.place(cell, player) {
                    game.moves.push(cell_label(cell));
                }
            }
            Message::Load {
                game_id,
                a_pct,
                b_pct,
            } => {
                if let Some(game) = self.games.get_mut(game_id as usize) {
                    // 200 on the wire is 100.0%.
                    game.load = [a_pct as u16 * 5, b_pct as u16 * 5];
                }
            }
        }
    }

    pub fn board(&self, game_id: usize) -> Option<&Board> {
        self.games.get(game_id).map(|g| &g.board)
    }

    pub fn moves(&self, game_id: usize) -> Option<&[String]> {
        self.games.get(game_id).map(|g| g.moves.as_slice())
    }

    /// Player A and B load for a game, in tenths of a percent.
    pub fn load_tenths(&self, game_id: usize) -> Option<(u16, u16)> {
        self.games.get(game_id).map(|g| (g.load[0], g.load[1]))
    }

    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Renders every game, followed by the counters when given.
    pub fn render(&self, stats: Option<&StatsSnapshot>) -> String {
        let mut out = String::new();
        for (id, game) in self.games.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}  Load O: {}  X: {}",
                format!("=== Game {} ===", id + 1).as_str().bold(),
                tenths(game.load[0]),
                tenths(game.load[1]),
            );
            for line in game.board.to_string().lines() {
                let line = line
                    .replace('O', &"O".green().bold().to_string())
                    .replace('X', &"X".red().bold().to_string());
                let _ = writeln!(out, "{line}");
            }
            let _ = writeln!(out, "Moves: {}", game.moves.join(" -> "));
        }
        if let Some(s) = stats {
            let footer = format!(
                "resets {}  ticks {}  moves {}  events {} (dropped {}){}",
                s.pool_resets,
                s.ticks,
                s.moves_applied,
                s.events_pushed,
                s.events_dropped,
                if s.cache_degraded { "  cache off" } else { "" },
            );
            let _ = writeln!(out, "{}", footer.as_str().dimmed());
        }
        out
    }
}

fn tenths(value: u16) -> String {
    format!("{:2}.{}%", value / 10, value % 10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kxo_shared::{encode_load, encode_move, encode_reset};

    #[test]
    fn test_split_reads() {
        let mut bytes = Vec::new();
        bytes.extend(encode_move(1, 4, true));
        bytes.extend(encode_load(2, 50, 200));
        bytes.extend(encode_reset());

        let mut decoder = StreamDecoder::new();
        let mut messages = Vec::new();
        for chunk in bytes.chunks(3) {
            messages.extend(decoder.feed(chunk));
        }
        assert!(!decoder.is_partial());
        assert_eq!(
            messages,
            vec![
                Message::Move {
                    game_id: 1,
                    cell: 4,
                    player_a: true
                },
                Message::Load {
                    game_id: 2,
                    a_pct: 50,
                    b_pct: 200
                },
                Message::Reset,
            ]
        );
    }

    #[test]
    fn test_empty_read_keeps_state() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.feed(&[0x01]).is_empty());
        assert!(decoder.feed(&[]).is_empty());
        assert!(decoder.is_partial());
        assert_eq!(
            decoder.feed(&[0x05]),
            vec![Message::Move {
                game_id: 1,
                cell: 2,
                player_a: true
            }]
        );
    }

    #[test]
    fn test_view_tracks_moves_and_load() {
        let mut view = BoardView::new(2);
        view.apply(Message::Move {
            game_id: 0,
            cell: 5,
            player_a: false,
        });
        view.apply(Message::Load {
            game_id: 0,
            a_pct: 25,
            b_pct: 200,
        });
        assert_eq!(view.moves(0).unwrap(), ["B3"]);
        assert_eq!(view.board(0).unwrap().count(Player::B), 1);
        assert_eq!(view.load_tenths(0), Some((125, 1000)));
        assert!(view.render(None).contains("Moves: B3"));

        view.apply(Message::Reset);
        assert!(view.board(0).unwrap().is_empty());
        assert_eq!(view.resets(), 1);
    }

    #[test]
    fn test_cell_label() {
        assert_eq!(cell_label(0), "A1");
        assert_eq!(cell_label(8), "C3");
    }
}
