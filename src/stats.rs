//! Arena counters.
//!
//! Plain atomics bumped from the ticker and the workers; `snapshot` copies
//! them out for display. Queue drops and cache degradation are read from the
//! queue and the cache themselves so there is a single source for each.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ArenaStats {
    ticks: AtomicU64,
    jobs_dispatched: AtomicU64,
    moves_applied: AtomicU64,
    no_moves: AtomicU64,
    games_decided: AtomicU64,
    pool_resets: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub jobs_dispatched: u64,
    pub moves_applied: u64,
    pub no_moves: u64,
    pub games_decided: u64,
    pub pool_resets: u64,
    pub events_pushed: u64,
    pub events_dropped: u64,
    pub cache_degraded: bool,
}

impl ArenaStats {
    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self) {
        self.jobs_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_move(&self, applied: bool) {
        let counter = if applied {
            &self.moves_applied
        } else {
            &self.no_moves
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decided(&self) {
        self.games_decided.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reset(&self) {
        self.pool_resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the counters, completing them with the queue and cache signals.
    pub fn snapshot(
        &self,
        events_pushed: u64,
        events_dropped: u64,
        cache_degraded: bool,
    ) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            jobs_dispatched: self.jobs_dispatched.load(Ordering::Relaxed),
            moves_applied: self.moves_applied.load(Ordering::Relaxed),
            no_moves: self.no_moves.load(Ordering::Relaxed),
            games_decided: self.games_decided.load(Ordering::Relaxed),
            pool_resets: self.pool_resets.load(Ordering::Relaxed),
            events_pushed,
            events_dropped,
            cache_degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = ArenaStats::default();
        stats.record_tick();
        stats.record_move(true);
        stats.record_move(false);
        stats.record_move(true);
        let snap = stats.snapshot(4, 1, false);
        assert_eq!(snap.ticks, 1);
        assert_eq!(snap.moves_applied, 2);
        assert_eq!(snap.no_moves, 1);
        assert_eq!(snap.events_dropped, 1);
    }
}
