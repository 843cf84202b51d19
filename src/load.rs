//! # Load Tracker
//!
//! Per-game, per-player activity ratio. Workers add the wall-clock time spent
//! computing a move; every tick folds that busy time into an exponentially
//! weighted moving average and zeroes it again.
//!
//! The average is fixed point with `FSHIFT` fractional bits, so it always lies
//! in `[0, FIXED_1]`. Workers and the ticker touch the same record from
//! different threads without sharing a lock, so busy time lives in an atomic
//! that the ticker drains with a single swap.

use crate::games::tictactoe::Player;
use kxo_shared::LOAD_SCALE;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Fractional bits of the fixed-point average.
pub const FSHIFT: u32 = 11;
/// 1.0 in fixed point.
pub const FIXED_1: u64 = 1 << FSHIFT;
/// Decay factor per tick, `FIXED_1 / exp(0.5s / 5s)`.
pub const EXP_5S: u64 = 1676;

/// Exponential moving average of one player's share of a tick spent busy.
#[derive(Debug, Default)]
pub struct LoadLog {
    ema: AtomicU64,
    busy_ns: AtomicU64,
}

impl LoadLog {
    /// An idle log: zero average, no busy time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates time a worker spent on this player's move.
    pub fn add_busy(&self, busy: Duration) {
        let ns = u64::try_from(busy.as_nanos()).unwrap_or(u64::MAX);
        self.busy_ns.fetch_add(ns, Ordering::AcqRel);
    }

    /// Busy time accumulated since the last fold.
    pub fn busy(&self) -> Duration {
        Duration::from_nanos(self.busy_ns.load(Ordering::Acquire))
    }

    /// Folds the busy time of the last `elapsed` into the average.
    ///
    /// Busy time is always drained. With `elapsed == 0` (the first tick) the
    /// average is left as is.
    pub fn fold(&self, elapsed: Duration) {
        let busy = self.busy_ns.swap(0, Ordering::AcqRel);
        let elapsed = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        if elapsed == 0 {
            return;
        }
        // A job can straddle two ticks, so clamp the ratio to 1.0.
        let ratio = (busy.saturating_mul(FIXED_1) / elapsed).min(FIXED_1);
        let old = self.ema.load(Ordering::Acquire);
        let ema = (old * EXP_5S + ratio * (FIXED_1 - EXP_5S)) >> FSHIFT;
        self.ema.store(ema, Ordering::Release);
    }

    /// Raw fixed-point average.
    pub fn ema(&self) -> u64 {
        self.ema.load(Ordering::Acquire)
    }

    /// Average scaled to the wire range `0..=200` (half-percent steps).
    pub fn percent(&self) -> u8 {
        ((self.ema() * LOAD_SCALE as u64) >> FSHIFT).min(LOAD_SCALE as u64) as u8
    }
}

/// Load logs for every game of the pool, one per player.
#[derive(Debug)]
pub struct LoadTracker {
    logs: Vec<[LoadLog; 2]>,
}

impl LoadTracker {
    /// One pair of idle logs per game.
    pub fn new(games: usize) -> Self {
        Self {
            logs: (0..games).map(|_| [LoadLog::new(), LoadLog::new()]).collect(),
        }
    }

    /// The log of `player` in game `game_id`.
    pub fn log(&self, game_id: usize, player: Player) -> Option<&LoadLog> {
        self.logs.get(game_id).map(|pair| &pair[player.index()])
    }

    /// Adds `busy` to the given player's log. Unknown ids are ignored.
    pub fn record(&self, game_id: usize, player: Player, busy: Duration) {
        if let Some(log) = self.log(game_id, player) {
            log.add_busy(busy);
        }
    }

    /// Folds one tick worth of `elapsed` time into every log.
    pub fn fold_all(&self, elapsed: Duration) {
        for pair in &self.logs {
            pair[0].fold(elapsed);
            pair[1].fold(elapsed);
        }
    }

    /// `(player A, player B)` load percentages for one game.
    pub fn report(&self, game_id: usize) -> Option<(u8, u8)> {
        self.logs
            .get(game_id)
            .map(|pair| (pair[0].percent(), pair[1].percent()))
    }

    /// Number of games tracked.
    pub fn len(&self) -> usize {
        self.logs.len()
    }

    /// True when no game is tracked.
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_keeps_average() {
        let log = LoadLog::new();
        log.add_busy(Duration::from_millis(300));
        log.fold(Duration::ZERO);
        assert_eq!(log.ema(), 0);
        assert_eq!(log.busy(), Duration::ZERO);
    }

    #[test]
    fn test_full_load_converges_to_one() {
        let log = LoadLog::new();
        for _ in 0..200 {
            log.add_busy(Duration::from_millis(500));
            log.fold(Duration::from_millis(500));
        }
        assert!(log.ema() <= FIXED_1);
        assert!(log.ema() > FIXED_1 * 9 / 10);
        assert!(log.percent() >= 180 && log.percent() <= 200);
    }

    #[test]
    fn test_overlong_busy_is_clamped() {
        let log = LoadLog::new();
        for _ in 0..500 {
            log.add_busy(Duration::from_secs(10));
            log.fold(Duration::from_nanos(1));
        }
        assert!(log.ema() <= FIXED_1);
        assert!(log.percent() <= 200);
    }

    #[test]
    fn test_idle_decays() {
        let log = LoadLog::new();
        log.add_busy(Duration::from_millis(500));
        log.fold(Duration::from_millis(500));
        let peak = log.ema();
        assert!(peak > 0);
        log.fold(Duration::from_millis(500));
        assert!(log.ema() < peak);
    }

    #[test]
    fn test_tracker_is_per_player() {
        let tracker = LoadTracker::new(2);
        tracker.record(1, Player::B, Duration::from_millis(250));
        tracker.record(7, Player::B, Duration::from_millis(250));
        tracker.fold_all(Duration::from_millis(500));
        let (a, b) = tracker.report(1).unwrap();
        assert_eq!(a, 0);
        assert!(b > 0);
        assert_eq!(tracker.report(0), Some((0, 0)));
        assert!(tracker.report(2).is_none());
    }
}
