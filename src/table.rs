//! # Game State Table
//!
//! The fixed pool of games, one exclusive lock per game, and the set of
//! decided games.
//!
//! A board, its turn and its decided flag are only changed while holding
//! that game's lock (through [`GameGuard`]). The dispatch pass must not wait on
//! a busy game, so two per-game fields also live outside the lock as atomics:
//! - `pending`: a move is owed and no job has been queued for it yet
//! - `turn`: a copy of the side to move, published before `pending` is set
//!
//! The decided counter is kept equal to the number of set decided flags:
//! every flag transition adjusts the counter in the same step.

use crate::games::tictactoe::{Board, Outcome, Player};
use parking_lot::{Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// One game of the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    id: usize,
    pub board: Board,
    pub turn: Player,
    pub last_move: Option<usize>,
}

impl Game {
    /// Empty board, player A to move.
    pub fn new(id: usize) -> Self {
        Self {
            id,
            board: Board::new(),
            turn: Player::A,
            last_move: None,
        }
    }

    /// Position of the game in the pool.
    pub fn id(&self) -> usize {
        self.id
    }

    fn reset(&mut self) {
        self.board.clear();
        self.turn = Player::A;
        self.last_move = None;
    }
}

fn turn_to_raw(player: Player) -> u8 {
    player.index() as u8
}

fn turn_from_raw(raw: u8) -> Player {
    if raw == 0 {
        Player::A
    } else {
        Player::B
    }
}

struct GameSlot {
    game: Mutex<Game>,
    pending: AtomicBool,
    turn: AtomicU8,
    decided: AtomicBool,
}

impl GameSlot {
    fn new(id: usize) -> Self {
        Self {
            game: Mutex::new(Game::new(id)),
            pending: AtomicBool::new(true),
            turn: AtomicU8::new(turn_to_raw(Player::A)),
            decided: AtomicBool::new(false),
        }
    }
}

/// The pool of games and the decided set.
pub struct GameTable {
    slots: Vec<GameSlot>,
    decided_count: AtomicUsize,
}

/// Exclusive access to one game.
pub struct GameGuard<'a> {
    game: MutexGuard<'a, Game>,
    slot: &'a GameSlot,
    decided_count: &'a AtomicUsize,
}

impl Deref for GameGuard<'_> {
    type Target = Game;

    fn deref(&self) -> &Game {
        &self.game
    }
}

impl DerefMut for GameGuard<'_> {
    fn deref_mut(&mut self) -> &mut Game {
        &mut self.game
    }
}

impl GameGuard<'_> {
    /// Whether the game already has a winner or a full board.
    pub fn is_decided(&self) -> bool {
        self.slot.decided.load(Ordering::Acquire)
    }

    /// Writes `cell` for the side to move and records it as the last move.
    ///
    /// # Returns
    /// false if the cell is taken or out of range; the board is unchanged
    pub fn place(&mut self, cell: usize) -> bool {
        let turn = self.game.turn;
        if self.game.board.place(cell, turn) {
            self.game.last_move = Some(cell);
            true
        } else {
            false
        }
    }

    /// Hands the move to the other player and evaluates the board.
    ///
    /// A decided game is flagged and counted; an undecided one is marked
    /// pending again so the next dispatch pass picks it up.
    pub fn finish_turn(&mut self) -> Option<Outcome> {
        let next = self.game.turn.other();
        self.game.turn = next;
        let outcome = self.game.board.outcome();
        if outcome.is_some() {
            if !self.slot.decided.swap(true, Ordering::AcqRel) {
                self.decided_count.fetch_add(1, Ordering::AcqRel);
            }
            self.slot.pending.store(false, Ordering::Release);
        } else {
            self.slot.turn.store(turn_to_raw(next), Ordering::Release);
            self.slot.pending.store(true, Ordering::Release);
        }
        outcome
    }
}

impl GameTable {
    /// Creates `games` fresh games, all pending with player A to move.
    pub fn new(games: usize) -> Self {
        Self {
            slots: (0..games).map(GameSlot::new).collect(),
            decided_count: AtomicUsize::new(0),
        }
    }

    /// Number of games in the pool.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True for a pool without games.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Blocks until the game's lock is free. `None` for unknown ids.
    pub fn lock(&self, game_id: usize) -> Option<GameGuard<'_>> {
        let slot = self.slots.get(game_id)?;
        Some(GameGuard {
            game: slot.game.lock(),
            slot,
            decided_count: &self.decided_count,
        })
    }

    /// Copy of a game's current state.
    pub fn snapshot(&self, game_id: usize) -> Option<Game> {
        self.slots.get(game_id).map(|s| s.game.lock().clone())
    }

    /// Claims the owed move of a game, if any.
    ///
    /// Clears `pending` and returns the side to move. At most one caller
    /// wins the claim per pending period.
    pub fn take_pending(&self, game_id: usize) -> Option<Player> {
        let slot = self.slots.get(game_id)?;
        slot.pending
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(turn_from_raw(slot.turn.load(Ordering::Acquire)))
    }

    /// A move is owed and not yet claimed. False for unknown ids.
    pub fn is_pending(&self, game_id: usize) -> bool {
        self.slots
            .get(game_id)
            .is_some_and(|s| s.pending.load(Ordering::Acquire))
    }

    /// Reads the decided flag without taking the game lock.
    pub fn is_decided(&self, game_id: usize) -> bool {
        self.slots
            .get(game_id)
            .is_some_and(|s| s.decided.load(Ordering::Acquire))
    }

    /// Decided games, from the counter.
    pub fn decided_count(&self) -> usize {
        self.decided_count.load(Ordering::Acquire)
    }

    /// Number of set decided flags, counted one by one.
    pub fn count_decided_flags(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.decided.load(Ordering::Acquire))
            .count()
    }

    /// Every game is decided and the pool is due for a reset.
    pub fn all_decided(&self) -> bool {
        !self.slots.is_empty() && self.decided_count() == self.slots.len()
    }

    /// Replaces one game's position, keeping the decided set consistent.
    ///
    /// An undecided position becomes pending with `to_move` to play.
    /// Returns false for unknown ids.
    pub fn set_position(&self, game_id: usize, board: Board, to_move: Player) -> bool {
        let Some(slot) = self.slots.get(game_id) else {
            return false;
        };
        let mut game = slot.game.lock();
        game.board = board;
        game.turn = to_move;
        game.last_move = None;
        let decided = board.outcome().is_some();
        let was_decided = slot.decided.swap(decided, Ordering::AcqRel);
        match (was_decided, decided) {
            (false, true) => {
                self.decided_count.fetch_add(1, Ordering::AcqRel);
            }
            (true, false) => {
                self.decided_count.fetch_sub(1, Ordering::AcqRel);
            }
            _ => {}
        }
        slot.turn.store(turn_to_raw(to_move), Ordering::Release);
        slot.pending.store(!decided, Ordering::Release);
        true
    }

    /// Clears every board and decided flag; every game becomes pending with
    /// player A to move.
    pub fn reset_all(&self) {
        for slot in &self.slots {
            let mut game = slot.game.lock();
            game.reset();
            if slot.decided.swap(false, Ordering::AcqRel) {
                self.decided_count.fetch_sub(1, Ordering::AcqRel);
            }
            slot.turn.store(turn_to_raw(Player::A), Ordering::Release);
            slot.pending.store(true, Ordering::Release);
        }
    }
}
