//! # Position Cache
//!
//! Memoises evaluated positions for the negamax engine. Positions are keyed by
//! a Zobrist hash of the board plus the side to move, so an entry stays valid
//! across games and across pool resets.
//!
//! ## Layout
//! A fixed number of buckets, each a chain of entries. Colliding keys coexist
//! in the chain; lookups match on the full 64-bit key. All access goes through
//! one lock.
//!
//! ## Degradation
//! If the bucket array (or a chain) cannot be allocated the cache turns inert:
//! every lookup misses and every store is dropped. Callers fall back to a full
//! search, and the condition is reported once.

use crate::games::tictactoe::{Board, Cell, Player};
use kxo_shared::N_GRIDS;
use parking_lot::Mutex;
use rand::RngCore;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Random keys for every (cell, player) pair plus the side to move.
#[derive(Debug, Clone)]
pub struct ZobristKeys {
    cells: [[u64; 2]; N_GRIDS],
    side_to_move: u64,
}

impl ZobristKeys {
    pub fn new(seed: u64) -> Self {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut cells = [[0u64; 2]; N_GRIDS];
        for pair in cells.iter_mut() {
            pair[0] = rng.next_u64();
            pair[1] = rng.next_u64();
        }
        Self {
            cells,
            side_to_move: rng.next_u64(),
        }
    }

    /// Hash of `board` with `to_move` about to play.
    pub fn hash(&self, board: &Board, to_move: Player) -> u64 {
        let mut key = match to_move {
            Player::A => 0,
            Player::B => self.side_to_move,
        };
        for (idx, cell) in board.cells().iter().enumerate() {
            if let Cell::Taken(p) = cell {
                key ^= self.cells[idx][p.index()];
            }
        }
        key
    }
}

/// A memoised search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: u64,
    pub score: i32,
    pub best_move: Option<usize>,
}

/// Thread-safe chained hash table of evaluated positions.
pub struct PositionCache {
    /// `None` once the cache is inert.
    buckets: Mutex<Option<Vec<Vec<CacheEntry>>>>,
    bucket_count: usize,
    degraded: AtomicBool,
}

impl PositionCache {
    /// Allocates `bucket_count` empty chains.
    ///
    /// Allocation failure is not an error: the returned cache is inert.
    pub fn new(bucket_count: usize) -> Self {
        let cache = Self {
            buckets: Mutex::new(None),
            bucket_count,
            degraded: AtomicBool::new(false),
        };
        let mut buckets: Vec<Vec<CacheEntry>> = Vec::new();
        if bucket_count == 0 || buckets.try_reserve_exact(bucket_count).is_err() {
            cache.degrade("failed to allocate bucket array");
            return cache;
        }
        buckets.resize_with(bucket_count, Vec::new);
        *cache.buckets.lock() = Some(buckets);
        cache
    }

    fn bucket_of(&self, key: u64) -> usize {
        (key % self.bucket_count as u64) as usize
    }

    fn degrade(&self, reason: &str) {
        if !self.degraded.swap(true, Ordering::AcqRel) {
            warn!(reason, "position cache disabled, falling back to full search");
        }
    }

    /// Finds the most recently stored entry whose key equals `key`.
    pub fn lookup(&self, key: u64) -> Option<CacheEntry> {
        let guard = self.buckets.lock();
        let buckets = guard.as_ref()?;
        buckets[self.bucket_of(key)]
            .iter()
            .rev()
            .find(|e| e.key == key)
            .copied()
    }

    /// Records a result. Duplicate keys are not collapsed.
    pub fn store(&self, key: u64, score: i32, best_move: Option<usize>) {
        let mut guard = self.buckets.lock();
        let Some(buckets) = guard.as_mut() else {
            return;
        };
        let chain = &mut buckets[self.bucket_of(key)];
        if chain.try_reserve(1).is_err() {
            *guard = None;
            drop(guard);
            self.degrade("failed to grow bucket chain");
            return;
        }
        chain.push(CacheEntry {
            key,
            score,
            best_move,
        });
    }

    /// Drops every entry, keeping the buckets allocated.
    pub fn clear(&self) {
        if let Some(buckets) = self.buckets.lock().as_mut() {
            for chain in buckets.iter_mut() {
                chain.clear();
            }
        }
    }

    /// Releases all memory. The cache stays inert afterwards.
    pub fn teardown(&self) {
        self.buckets.lock().take();
    }

    /// Total number of stored entries.
    pub fn len(&self) -> usize {
        self.buckets
            .lock()
            .as_ref()
            .map(|b| b.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once an allocation failure switched the cache off.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// True when lookups can no longer hit (degraded or torn down).
    pub fn is_inert(&self) -> bool {
        self.buckets.lock().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_then_lookup() {
        let cache = PositionCache::new(16);
        assert!(cache.lookup(42).is_none());
        cache.store(42, 7, Some(3));
        let entry = cache.lookup(42).unwrap();
        assert_eq!(entry.key, 42);
        assert_eq!(entry.score, 7);
        assert_eq!(entry.best_move, Some(3));
    }

    #[test]
    fn test_colliding_keys_coexist() {
        let cache = PositionCache::new(4);
        // 1 and 5 share bucket 1.
        cache.store(1, 10, Some(0));
        cache.store(5, -10, Some(8));
        assert_eq!(cache.lookup(1).unwrap().score, 10);
        assert_eq!(cache.lookup(5).unwrap().score, -10);
        assert!(cache.lookup(9).is_none());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_latest_store_wins() {
        let cache = PositionCache::new(4);
        cache.store(2, 1, Some(1));
        cache.store(2, 1, Some(4));
        assert_eq!(cache.lookup(2).unwrap().best_move, Some(4));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_clear_keeps_cache_usable() {
        let cache = PositionCache::new(8);
        cache.store(3, 0, None);
        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.is_inert());
        cache.store(3, 1, None);
        assert_eq!(cache.lookup(3).unwrap().score, 1);
    }

    #[test]
    fn test_teardown_makes_inert() {
        let cache = PositionCache::new(8);
        cache.store(3, 0, None);
        cache.teardown();
        assert!(cache.is_inert());
        cache.store(3, 0, None);
        assert!(cache.lookup(3).is_none());
    }

    #[test]
    fn test_allocation_failure_degrades() {
        let cache = PositionCache::new(usize::MAX);
        assert!(cache.is_degraded());
        assert!(cache.is_inert());
        cache.store(1, 1, Some(1));
        assert!(cache.lookup(1).is_none());
    }

    #[test]
    fn test_zobrist_is_deterministic_and_side_aware() {
        let keys = ZobristKeys::new(7);
        let mut board = Board::new();
        board.place(4, Player::A);
        let a = keys.hash(&board, Player::B);
        assert_eq!(a, ZobristKeys::new(7).hash(&board, Player::B));
        assert_ne!(a, keys.hash(&board, Player::A));
        assert_eq!(keys.hash(&Board::new(), Player::A), 0);
    }
}
