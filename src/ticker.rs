//! # Tick Scheduler
//!
//! Fires on a fixed period. Each tick folds the busy time accumulated since
//! the previous tick into the load averages, queues one load report per game
//! and runs a dispatch pass. The tick itself only does bookkeeping; move
//! computation happens on the worker pool.

use crate::dispatch::{ArenaContext, DispatchOutcome, Dispatcher};
use crate::error::Result;
use crate::events::Event;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, trace};

pub struct Ticker {
    ctx: Arc<ArenaContext>,
    dispatcher: Arc<Dispatcher>,
    last_tick: Mutex<Option<Instant>>,
}

impl Ticker {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            ctx: dispatcher.context().clone(),
            dispatcher,
            last_tick: Mutex::new(None),
        }
    }

    pub fn tick(&self) -> DispatchOutcome {
        self.tick_at(Instant::now())
    }

    /// Runs one tick as if it fired at `now`.
    ///
    /// The first tick after construction or [`Ticker::rewind`] sees zero
    /// elapsed time and leaves the averages untouched.
    pub fn tick_at(&self, now: Instant) -> DispatchOutcome {
        let elapsed = {
            let mut last = self.last_tick.lock();
            let elapsed = last
                .map(|prev| now.saturating_duration_since(prev))
                .unwrap_or_default();
            *last = Some(now);
            elapsed
        };

        let ctx = &self.ctx;
        ctx.loads.fold_all(elapsed);
        if ctx.control.display_enabled() {
            for game_id in 0..ctx.loads.len() {
                if let Some((a_pct, b_pct)) = ctx.loads.report(game_id) {
                    ctx.queue.push_event(&Event::Load {
                        game_id,
                        a_pct,
                        b_pct,
                    });
                }
            }
        }
        ctx.stats.record_tick();
        trace!(elapsed_us = elapsed.as_micros() as u64, "tick");

        self.dispatcher.dispatch_pass()
    }

    /// Forgets the previous tick time.
    pub fn rewind(&self) {
        *self.last_tick.lock() = None;
    }

    /// Starts firing every `period` on a dedicated thread.
    pub fn spawn(self: &Arc<Self>, period: Duration) -> Result<TickerHandle> {
        let signal = Arc::new(StopSignal::default());
        let ticker = self.clone();
        let thread_signal = signal.clone();
        let thread = std::thread::Builder::new()
            .name("kxo-ticker".to_string())
            .spawn(move || ticker.run(period, &thread_signal))?;
        info!(period_ms = period.as_millis() as u64, "ticker started");
        Ok(TickerHandle {
            signal,
            thread: Some(thread),
        })
    }

    fn run(&self, period: Duration, signal: &StopSignal) {
        let mut next = Instant::now() + period;
        loop {
            if signal.wait_until(next) {
                break;
            }
            self.tick();
            next += period;
            let now = Instant::now();
            if next <= now {
                // Missed slots are skipped rather than replayed.
                next = now + period;
            }
        }
    }
}

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl StopSignal {
    fn stop(&self) {
        *self.stopped.lock() = true;
        self.cv.notify_all();
    }

    /// Sleeps until `deadline`. Returns true if stopped meanwhile.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.cv.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

/// A running ticker thread. Dropping it stops the thread and joins it.
pub struct TickerHandle {
    signal: Arc<StopSignal>,
    thread: Option<JoinHandle<()>>,
}

impl TickerHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.signal.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            info!("ticker stopped");
        }
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
