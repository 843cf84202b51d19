//! # Monte Carlo Tree Search Engine
//!
//! Player A's engine. Each call builds a fresh tree for the given position,
//! runs a fixed number of select / expand / playout / backpropagate rounds and
//! plays the most visited root move.
//!
//! Worker jobs already run in parallel across games, so a single search runs
//! its simulations sequentially. The tree still uses atomics and locks so a
//! search object can be shared between threads.

use super::{winning_move, MoveSelector};
use crate::cache::PositionCache;
use crate::games::tictactoe::{Board, Player, TicTacToeState};
use crate::GameState;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;

/// Default exploration constant, sqrt(2).
pub const EXPLORATION: f64 = std::f64::consts::SQRT_2;

/// A node in the search tree.
struct Node<M: Clone + Eq + std::hash::Hash + Send + Sync> {
    /// Sum of rewards from the point of view of the player who moved into this node.
    wins: Mutex<f64>,
    /// Number of times this node has been visited.
    visits: AtomicI32,
    children: Mutex<HashMap<M, Arc<Node<M>>>>,
}

impl<M: Clone + Eq + std::hash::Hash + Send + Sync> Node<M> {
    fn new() -> Self {
        Node {
            wins: Mutex::new(0.0),
            visits: AtomicI32::new(0),
            children: Mutex::new(HashMap::new()),
        }
    }

    /// UCB1 score, balancing exploration and exploitation.
    ///
    /// # Arguments
    /// * `parent_visits` - The number of visits to the parent node.
    /// * `exploration` - A constant to tune the level of exploration.
    fn ucb1(&self, parent_visits: i32, exploration: f64) -> f64 {
        let visits = self.visits.load(Ordering::Relaxed);
        if visits == 0 {
            f64::INFINITY
        } else {
            let wins = *self.wins.lock();
            wins / visits as f64
                + exploration * ((parent_visits as f64).ln() / visits as f64).sqrt()
        }
    }
}

/// One tree search over any [`GameState`].
pub struct Mcts<S: GameState> {
    root: Arc<Node<S::Move>>,
    exploration: f64,
}

impl<S: GameState> Mcts<S> {
    pub fn new(exploration: f64) -> Self {
        Mcts {
            root: Arc::new(Node::new()),
            exploration,
        }
    }

    /// Runs `iterations` simulations from `state` and returns the most visited move.
    ///
    /// `None` when `state` has no legal move.
    pub fn search<R: Rng>(&self, state: &S, iterations: u32, rng: &mut R) -> Option<S::Move> {
        if state.get_possible_moves().is_empty() {
            return None;
        }
        for _ in 0..iterations.max(1) {
            self.run_simulation(state, rng);
        }
        let children = self.root.children.lock();
        children
            .iter()
            .max_by_key(|(_, node)| node.visits.load(Ordering::Relaxed))
            .map(|(mv, _)| mv.clone())
    }

    /// Visit counts of the root's children.
    pub fn root_visits(&self) -> HashMap<S::Move, i32> {
        self.root
            .children
            .lock()
            .iter()
            .map(|(mv, node)| (mv.clone(), node.visits.load(Ordering::Relaxed)))
            .collect()
    }

    fn run_simulation<R: Rng>(&self, state: &S, rng: &mut R) {
        let mut current_state = state.clone();
        let mut path: Vec<Arc<Node<S::Move>>> = vec![self.root.clone()];
        let mut current_node = self.root.clone();

        // Selection: walk down until a leaf.
        loop {
            let parent_visits = current_node.visits.load(Ordering::Relaxed);
            let mut children = current_node.children.lock();

            if children.is_empty() || current_state.is_terminal() {
                // Expansion
                if !current_state.is_terminal() {
                    for mv in current_state.get_possible_moves() {
                        children.insert(mv, Arc::new(Node::new()));
                    }
                }
                break;
            }

            let next = current_state
                .get_possible_moves()
                .iter()
                .filter_map(|m| children.get(m).map(|n| (m.clone(), n.clone())))
                .max_by(|(_, a), (_, b)| {
                    let a_ucb = a.ucb1(parent_visits, self.exploration);
                    let b_ucb = b.ucb1(parent_visits, self.exploration);
                    a_ucb.partial_cmp(&b_ucb).unwrap_or(std::cmp::Ordering::Equal)
                });
            drop(children);

            let Some((best_move, next_node)) = next else {
                break;
            };
            current_state.make_move(&best_move);
            current_node = next_node;
            path.push(current_node.clone());
        }

        // Playout
        let mut sim_state = current_state.clone();
        while !sim_state.is_terminal() {
            let moves = sim_state.get_possible_moves();
            if moves.is_empty() {
                break;
            }
            let mv = &moves[rng.random_range(0..moves.len())];
            sim_state.make_move(mv);
        }
        let winner = sim_state.get_winner();

        // Backpropagation: each node is scored for the player who moved into it.
        let mut to_move = current_state.get_current_player();
        for node in path.iter().rev() {
            node.visits.fetch_add(1, Ordering::Relaxed);
            let reward = match winner {
                Some(w) if w == to_move => 0.0,
                Some(_) => 1.0,
                None => 0.5,
            };
            *node.wins.lock() += reward;
            to_move = S::other(to_move);
        }
    }
}

/// Player A's move selector.
pub struct MctsEngine {
    iterations: u32,
    exploration: f64,
    seed: u64,
    searches: AtomicU64,
}

impl MctsEngine {
    pub fn new(iterations: u32, seed: u64) -> Self {
        Self {
            iterations,
            exploration: EXPLORATION,
            seed,
            searches: AtomicU64::new(0),
        }
    }
}

impl MoveSelector for MctsEngine {
    fn name(&self) -> &'static str {
        "mcts"
    }

    fn choose_move(&self, board: &Board, player: Player, _cache: &PositionCache) -> Option<usize> {
        let state = TicTacToeState::new(*board, player);
        if state.is_terminal() {
            return None;
        }
        if let Some(cell) =
            winning_move(board, player).or_else(|| winning_move(board, player.other()))
        {
            return Some(cell);
        }
        // Every search gets its own stream so concurrent games do not replay
        // the same playouts.
        let n = self.searches.fetch_add(1, Ordering::Relaxed);
        let mut rng =
            Xoshiro256PlusPlus::seed_from_u64(self.seed ^ n.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        Mcts::<TicTacToeState>::new(self.exploration).search(&state, self.iterations, &mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_board_returns_a_cell() {
        let engine = MctsEngine::new(200, 1);
        let cache = PositionCache::new(1);
        let cell = engine
            .choose_move(&Board::new(), Player::A, &cache)
            .unwrap();
        assert!(cell < 9);
    }

    #[test]
    fn test_takes_immediate_win() {
        let mut board = Board::new();
        board.place(0, Player::A);
        board.place(1, Player::A);
        board.place(4, Player::B);
        board.place(8, Player::B);
        let engine = MctsEngine::new(50, 3);
        let cache = PositionCache::new(1);
        assert_eq!(engine.choose_move(&board, Player::A, &cache), Some(2));
    }

    #[test]
    fn test_full_board_has_no_move() {
        let mut board = Board::new();
        for (cell, p) in [
            (0, Player::A),
            (1, Player::B),
            (2, Player::A),
            (3, Player::A),
            (4, Player::B),
            (5, Player::B),
            (6, Player::B),
            (7, Player::A),
            (8, Player::A),
        ] {
            board.place(cell, p);
        }
        let engine = MctsEngine::new(10, 0);
        let cache = PositionCache::new(1);
        assert_eq!(engine.choose_move(&board, Player::A, &cache), None);
    }

    #[test]
    fn test_blocks_opponent_line() {
        // B threatens 0-4-8 and A has no win, so A must take 8.
        let mut board = Board::new();
        board.place(0, Player::B);
        board.place(4, Player::B);
        board.place(1, Player::A);
        let engine = MctsEngine::new(10, 11);
        let cache = PositionCache::new(1);
        assert_eq!(engine.choose_move(&board, Player::A, &cache), Some(8));
    }

    #[test]
    fn test_root_visits_sum() {
        let mcts = Mcts::<TicTacToeState>::new(EXPLORATION);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let state = TicTacToeState::new(Board::new(), Player::A);
        mcts.search(&state, 100, &mut rng);
        let total: i32 = mcts.root_visits().values().sum();
        // The first simulation only expands the root.
        assert_eq!(total, 99);
    }
}
