//! # Worker Dispatch
//!
//! The shared arena context and the dispatcher that turns owed moves into
//! jobs on a rayon thread pool.
//!
//! A dispatch pass never waits on a busy game: it claims owed moves through
//! the table's `pending` flags, and the per-game lock is only taken inside
//! the job. Jobs for different games run in parallel; two jobs for the same
//! game cannot both exist because a claim clears `pending` and only the job
//! itself sets it again.

use crate::cache::PositionCache;
use crate::control::ControlState;
use crate::engine::Engines;
use crate::error::Result;
use crate::events::{Event, EventQueue};
use crate::games::tictactoe::Player;
use crate::load::LoadTracker;
use crate::stats::{ArenaStats, StatsSnapshot};
use crate::table::GameTable;
use parking_lot::{Condvar, Mutex};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use std::time::Instant;
use std::any::Any;
use tracing::{debug, error, info, trace};

/// Everything the ticker, the dispatcher and the workers share.
pub struct ArenaContext {
    pub table: GameTable,
    pub cache: PositionCache,
    pub loads: LoadTracker,
    pub queue: EventQueue,
    pub control: ControlState,
    pub stats: ArenaStats,
    pub engines: Engines,
}

impl ArenaContext {
    pub fn new(
        games: usize,
        queue_capacity: usize,
        cache_buckets: usize,
        engines: Engines,
    ) -> Self {
        Self {
            table: GameTable::new(games),
            cache: PositionCache::new(cache_buckets),
            loads: LoadTracker::new(games),
            queue: EventQueue::new(queue_capacity),
            control: ControlState::default(),
            stats: ArenaStats::default(),
            engines,
        }
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot(
            self.queue.pushed(),
            self.queue.dropped(),
            self.cache.is_degraded(),
        )
    }
}

/// What a dispatch pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every game was decided; the pool was reset and nothing was scheduled.
    Reset,
    /// The stop flag is set; nothing was scheduled.
    Stopped,
    /// This many jobs were submitted.
    Scheduled(usize),
}

/// Count of submitted jobs that have not finished yet.
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn begin(&self) {
        *self.count.lock() += 1;
    }

    fn end(&self) {
        let mut count = self.count.lock();
        *count -= 1;
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }
}

/// Ends the in-flight record even if the engine panics. The pool's panic
/// handler then logs the panic and the claimed game stays without a job.
struct JobGuard(Arc<InFlight>);

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.0.end();
    }
}

pub struct Dispatcher {
    ctx: Arc<ArenaContext>,
    pool: ThreadPool,
    in_flight: Arc<InFlight>,
    pass: Mutex<()>,
}

impl Dispatcher {
    /// Builds the worker pool with `workers` threads.
    pub fn new(ctx: Arc<ArenaContext>, workers: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("kxo-worker-{i}"))
            .panic_handler(log_job_panic)
            .build()?;
        Ok(Self {
            ctx,
            pool,
            in_flight: Arc::new(InFlight::default()),
            pass: Mutex::new(()),
        })
    }

    pub fn context(&self) -> &Arc<ArenaContext> {
        &self.ctx
    }

    /// Inspects every game once and submits the owed moves.
    ///
    /// When the whole pool is decided the games are reset instead and a
    /// single reset marker is queued. Resetting takes every game lock, so
    /// the move event of the job that decided the last game is always
    /// queued before the marker.
    pub fn dispatch_pass(&self) -> DispatchOutcome {
        let _pass = self.pass.lock();
        let ctx = &self.ctx;

        if ctx.control.stop_requested() {
            trace!("stop requested, dispatch skipped");
            return DispatchOutcome::Stopped;
        }

        if ctx.table.all_decided() {
            ctx.table.reset_all();
            ctx.queue.push_event(&Event::Reset);
            ctx.stats.record_reset();
            info!(games = ctx.table.len(), "all games decided, pool reset");
            return DispatchOutcome::Reset;
        }

        let mut scheduled = 0;
        for game_id in 0..ctx.table.len() {
            if let Some(player) = ctx.table.take_pending(game_id) {
                self.submit(game_id, player);
                scheduled += 1;
            }
        }
        trace!(scheduled, "dispatch pass");
        DispatchOutcome::Scheduled(scheduled)
    }

    fn submit(&self, game_id: usize, player: Player) {
        self.in_flight.begin();
        self.ctx.stats.record_dispatch();
        let guard = JobGuard(self.in_flight.clone());
        let ctx = self.ctx.clone();
        self.pool.spawn(move || {
            let _guard = guard;
            run_job(&ctx, game_id, player);
        });
    }

    /// Blocks until every submitted job has finished.
    pub fn wait_idle(&self) {
        self.in_flight.wait_idle();
    }

    pub fn in_flight(&self) -> usize {
        *self.in_flight.count.lock()
    }
}

/// Logs a panicking job. Without a handler rayon aborts the process.
fn log_job_panic(payload: Box<dyn Any + Send>) {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    error!(panic = message, "worker job panicked, its game is stalled");
}

/// One move computation for one game.
fn run_job(ctx: &ArenaContext, game_id: usize, claimed: Player) {
    let started = Instant::now();
    let Some(mut game) = ctx.table.lock(game_id) else {
        return;
    };
    if game.is_decided() {
        debug!(game_id, "game already decided, job skipped");
        return;
    }

    let player = game.turn;
    debug_assert_eq!(player, claimed);
    let engine = ctx.engines.for_player(player);
    let board = game.board;
    let choice = engine.choose_move(&board, player, &ctx.cache);
    let applied = match choice {
        Some(cell) => game.place(cell),
        None => false,
    };
    ctx.stats.record_move(applied);

    let outcome = game.finish_turn();
    if let Some(outcome) = outcome {
        ctx.stats.record_decided();
        debug!(game_id, ?outcome, "game decided");
    }

    if applied && ctx.control.display_enabled() {
        if let Some(cell) = game.last_move {
            ctx.queue.push_event(&Event::Move {
                game_id,
                cell,
                player,
            });
        }
    }
    drop(game);

    let busy = started.elapsed();
    ctx.loads.record(game_id, player, busy);
    debug!(
        game_id,
        engine = engine.name(),
        player = %player,
        cell = ?choice,
        applied,
        busy_us = busy.as_micros() as u64,
        "move computed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MoveSelector;
    use crate::games::tictactoe::Board;

    /// Always plays the first empty cell.
    struct FirstEmpty;

    impl MoveSelector for FirstEmpty {
        fn name(&self) -> &'static str {
            "first-empty"
        }

        fn choose_move(
            &self,
            board: &Board,
            _player: Player,
            _cache: &PositionCache,
        ) -> Option<usize> {
            board.empty_cells().next()
        }
    }

    fn dispatcher(games: usize) -> Dispatcher {
        let engines = Engines::new(Arc::new(FirstEmpty), Arc::new(FirstEmpty));
        let ctx = Arc::new(ArenaContext::new(games, 4096, 16, engines));
        Dispatcher::new(ctx, 2).unwrap()
    }

    #[test]
    fn test_pass_schedules_every_pending_game() {
        let d = dispatcher(3);
        assert_eq!(d.dispatch_pass(), DispatchOutcome::Scheduled(3));
        d.wait_idle();
        assert_eq!(d.in_flight(), 0);
        for id in 0..3 {
            let game = d.context().table.snapshot(id).unwrap();
            assert_eq!(game.board.count(Player::A), 1);
            assert_eq!(game.turn, Player::B);
        }
        assert_eq!(d.context().queue.len(), 6);
    }

    #[test]
    fn test_stop_skips_dispatch() {
        let d = dispatcher(2);
        d.context().control.modify(|f| f.stop = true);
        assert_eq!(d.dispatch_pass(), DispatchOutcome::Stopped);
        assert!(d.context().table.is_pending(0));
        assert_eq!(d.in_flight(), 0);
    }

    #[test]
    fn test_plays_to_reset() {
        let d = dispatcher(1);
        // A takes 0, 2, 4, 6 and wins on the 2-4-6 diagonal with the 7th move.
        let mut passes = 0;
        loop {
            passes += 1;
            assert!(passes <= 8);
            let outcome = d.dispatch_pass();
            d.wait_idle();
            if outcome == DispatchOutcome::Reset {
                break;
            }
        }
        let ctx = d.context();
        assert_eq!(ctx.table.decided_count(), 0);
        assert!(ctx.table.snapshot(0).unwrap().board.is_empty());
        let bytes = ctx.queue.try_drain(usize::MAX);
        assert_eq!(&bytes[bytes.len() - 2..], &[0x80, 0]);
        assert_eq!(ctx.stats_snapshot().pool_resets, 1);
    }
}
