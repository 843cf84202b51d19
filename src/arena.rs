//! # Arena
//!
//! Owns the shared context, the worker pool and the ticker, and hands out
//! [`Session`]s to event consumers.
//!
//! The ticker only runs while at least one session is open. Closing the
//! last session stops it, waits for in-flight jobs and clears the stop flag,
//! leaving the games where they are for the next session.

use crate::config::Config;
use crate::control::ControlState;
use crate::dispatch::{ArenaContext, Dispatcher};
use crate::engine::Engines;
use crate::error::{QueueError, Result};
use crate::events::ReadMode;
use crate::stats::StatsSnapshot;
use crate::ticker::{Ticker, TickerHandle};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Default)]
struct Sessions {
    open: usize,
    ticker: Option<TickerHandle>,
}

pub struct Arena {
    config: Config,
    ctx: Arc<ArenaContext>,
    dispatcher: Arc<Dispatcher>,
    ticker: Arc<Ticker>,
    sessions: Mutex<Sessions>,
}

impl Arena {
    /// Builds an arena with the standard engines.
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let engines = Engines::standard(config.mcts_iterations, config.resolve_seed());
        Self::with_engines(config, engines)
    }

    pub fn with_engines(config: Config, engines: Engines) -> Result<Arc<Self>> {
        config.validate()?;
        let ctx = Arc::new(ArenaContext::new(
            config.games,
            config.queue_capacity,
            config.cache_buckets,
            engines,
        ));
        let dispatcher = Arc::new(Dispatcher::new(ctx.clone(), config.workers)?);
        let ticker = Arc::new(Ticker::new(dispatcher.clone()));
        info!(
            games = config.games,
            workers = config.workers,
            tick_ms = config.tick_ms,
            "arena ready"
        );
        Ok(Arc::new(Self {
            config,
            ctx,
            dispatcher,
            ticker,
            sessions: Mutex::new(Sessions::default()),
        }))
    }

    /// Opens a consumer session. The first open session starts the ticker.
    pub fn open(self: &Arc<Self>) -> Result<Session> {
        let mut sessions = self.sessions.lock();
        if sessions.open == 0 {
            self.ticker.rewind();
            sessions.ticker = Some(self.ticker.spawn(self.config.tick_period())?);
        }
        sessions.open += 1;
        info!(open = sessions.open, "session opened");
        Ok(Session {
            arena: self.clone(),
        })
    }

    fn release(&self) {
        let mut sessions = self.sessions.lock();
        sessions.open = sessions.open.saturating_sub(1);
        info!(open = sessions.open, "session closed");
        if sessions.open > 0 {
            return;
        }
        if let Some(handle) = sessions.ticker.take() {
            handle.stop();
        }
        self.dispatcher.wait_idle();
        self.ctx.control.modify(|flags| flags.stop = false);
        self.ctx.queue.interrupt();
        debug!("last session closed, workers idle");
    }

    pub fn context(&self) -> &Arc<ArenaContext> {
        &self.ctx
    }

    pub fn control(&self) -> &ControlState {
        &self.ctx.control
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn ticker(&self) -> &Arc<Ticker> {
        &self.ticker
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.stats_snapshot()
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().open
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        self.ctx.cache.teardown();
    }
}

/// A consumer of the event stream. Dropping the last one parks the arena.
pub struct Session {
    arena: Arc<Arena>,
}

impl Session {
    /// Copies queued event bytes into `buf`; see [`ReadMode`].
    pub fn read(
        &self,
        buf: &mut [u8],
        mode: ReadMode,
    ) -> std::result::Result<usize, QueueError> {
        self.arena.ctx.queue.read_into(buf, mode)
    }

    /// Wakes a read parked on this arena's queue.
    pub fn interrupt(&self) {
        self.arena.ctx.queue.interrupt();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.arena.release();
    }
}
