//! Runtime configuration, parsed from the command line by the `kxo` binary
//! and built with [`Config::default`] when the arena is embedded.

use crate::error::ConfigError;
use clap::Parser;
use kxo_shared::{EVENT_SIZE, MAX_GAMES};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[clap(author, version, about = "Automated tic-tac-toe arena", long_about = None)]
pub struct Config {
    /// Number of concurrent games
    #[clap(short, long, default_value_t = 9)]
    pub games: usize,

    /// Tick period in milliseconds
    #[clap(short, long, default_value_t = 500)]
    pub tick_ms: u64,

    /// Worker threads applying moves
    #[clap(short, long, default_value_t = num_cpus::get())]
    pub workers: usize,

    /// Event queue capacity in bytes
    #[clap(long, default_value_t = 4096)]
    pub queue_capacity: usize,

    /// Position cache bucket count
    #[clap(long, default_value_t = 4096)]
    pub cache_buckets: usize,

    /// Simulations per MCTS move
    #[clap(short = 'i', long, default_value_t = 1000)]
    pub mcts_iterations: u32,

    /// Seed for Zobrist keys and playouts
    #[clap(short, long)]
    pub seed: Option<u64>,

    /// Stop the viewer after this many seconds, 0 runs until Ctrl-C
    #[clap(short, long, default_value_t = 0)]
    pub duration_secs: u64,

    /// Viewer repaint period in milliseconds
    #[clap(long, default_value_t = 100)]
    pub refresh_ms: u64,

    /// Default log filter when RUST_LOG is unset
    #[clap(long, default_value = "warn")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            games: 9,
            tick_ms: 500,
            workers: num_cpus::get(),
            queue_capacity: 4096,
            cache_buckets: 4096,
            mcts_iterations: 1000,
            seed: None,
            duration_secs: 0,
            refresh_ms: 100,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.games == 0 || self.games > MAX_GAMES {
            return Err(ConfigError::GameCount {
                got: self.games,
                max: MAX_GAMES,
            });
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::TickPeriod);
        }
        if self.workers == 0 {
            return Err(ConfigError::Workers);
        }
        // A load report is two records pushed together.
        if self.queue_capacity < 2 * EVENT_SIZE {
            return Err(ConfigError::QueueCapacity(self.queue_capacity));
        }
        if self.cache_buckets == 0 {
            return Err(ConfigError::CacheBuckets);
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.max(1))
    }

    /// Run limit for the viewer, `None` when unbounded.
    pub fn duration(&self) -> Option<Duration> {
        (self.duration_secs > 0).then(|| Duration::from_secs(self.duration_secs))
    }

    /// The configured seed, or one derived from the clock.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0x5EED)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.tick_period(), Duration::from_millis(500));
        assert_eq!(config.duration(), None);
    }

    #[test]
    fn test_parse_flags() {
        let config = Config::parse_from([
            "kxo",
            "--games",
            "4",
            "--tick-ms",
            "50",
            "--seed",
            "7",
            "--duration-secs",
            "3",
        ]);
        assert_eq!(config.games, 4);
        assert_eq!(config.tick_ms, 50);
        assert_eq!(config.resolve_seed(), 7);
        assert_eq!(config.duration(), Some(Duration::from_secs(3)));
        assert_eq!(config.mcts_iterations, 1000);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = Config {
            games: 65,
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::GameCount { got: 65, max: 64 })
        );
        config.games = 0;
        assert!(config.validate().is_err());
        config.games = 1;
        config.tick_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::TickPeriod));
        config.tick_ms = 1;
        config.queue_capacity = 3;
        assert_eq!(config.validate(), Err(ConfigError::QueueCapacity(3)));
        config.queue_capacity = 4;
        config.workers = 0;
        assert_eq!(config.validate(), Err(ConfigError::Workers));
    }
}
