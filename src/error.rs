//! Error types for the arena.
//!
//! Nothing in the scheduling core is fatal: these errors describe bad
//! configuration, malformed control records and the non-data outcomes of a
//! consumer read.

use thiserror::Error;

/// Rejected configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("game count must be between 1 and {max}, got {got}")]
    GameCount { got: usize, max: usize },
    #[error("tick period must be at least 1 ms")]
    TickPeriod,
    #[error("worker pool needs at least one thread")]
    Workers,
    #[error("queue capacity {0} cannot hold a single event")]
    QueueCapacity(usize),
    #[error("position cache needs at least one bucket")]
    CacheBuckets,
}

/// Malformed control record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("control record must hold 3 flags, got {0}")]
    FieldCount(usize),
    #[error("unrecognised flag token {0:?}, expected '0' or '1'")]
    Token(String),
}

/// Non-data outcomes of draining the event queue.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("no event data available")]
    WouldBlock,
    #[error("blocked read was interrupted")]
    Interrupted,
}

/// Top-level error.
#[derive(Debug, Error)]
pub enum KxoError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("failed to install log subscriber: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, KxoError>;
