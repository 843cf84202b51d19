//! # kxo
//!
//! Runs the game arena and shows its event stream in the terminal.
//!
//! An I/O task drains the session into a [`BoardView`], the main task
//! repaints it every `--refresh-ms` and Ctrl-C (or `--duration-secs`) ends
//! the run. Set `RUST_LOG` to override `--log-level`.

use clap::Parser;
use kxo::error::QueueError;
use kxo::viewer::{BoardView, StreamDecoder};
use kxo::{Arena, Config, KxoError, ReadMode};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tracing::{error, info};

fn init_tracing(level: &str) -> Result<(), KxoError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .map_err(|e| KxoError::Logging(e.to_string()))
}

fn clock(started: Instant) -> String {
    let secs = started.elapsed().as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

#[tokio::main]
async fn main() -> Result<(), KxoError> {
    let config = Config::parse();
    config.validate()?;
    init_tracing(&config.log_level)?;

    let refresh = config.refresh_period();
    let run_limit = config.duration();
    let view = Arc::new(Mutex::new(BoardView::new(config.games)));
    let arena = Arena::new(config)?;
    let session = Arc::new(arena.open()?);
    let quit = Arc::new(AtomicBool::new(false));

    let io_task = {
        let session = session.clone();
        let view = view.clone();
        let quit = quit.clone();
        tokio::task::spawn_blocking(move || {
            let mut decoder = StreamDecoder::new();
            let mut buf = [0u8; 256];
            while !quit.load(Ordering::Acquire) {
                match session.read(&mut buf, ReadMode::Timeout(refresh)) {
                    Ok(n) => {
                        let messages = decoder.feed(&buf[..n]);
                        if !messages.is_empty() {
                            let mut view = view.lock();
                            for message in messages {
                                view.apply(message);
                            }
                        }
                    }
                    Err(QueueError::Interrupted) | Err(QueueError::WouldBlock) => {}
                }
            }
        })
    };

    let started = Instant::now();
    let mut repaint = tokio::time::interval(refresh);
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let deadline = async {
        match run_limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = repaint.tick() => {
                let frame = view.lock().render(Some(&arena.stats()));
                print!("\x1b[2J\x1b[H");
                println!("Time: {}", clock(started));
                print!("{frame}");
            }
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    error!("failed to listen for ctrl-c: {e}");
                }
                info!("interrupted, shutting down");
                break;
            }
            _ = &mut deadline => {
                info!("run limit reached, shutting down");
                break;
            }
        }
    }

    quit.store(true, Ordering::Release);
    session.interrupt();
    if let Err(e) = io_task.await {
        error!("io task failed: {e}");
    }
    drop(session);

    let stats = arena.stats();
    println!(
        "{} resets, {} moves, {} events ({} dropped)",
        stats.pool_resets, stats.moves_applied, stats.events_pushed, stats.events_dropped
    );
    Ok(())
}
