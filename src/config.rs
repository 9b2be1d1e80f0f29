use clap::Parser;
use std::time::Duration;

use crate::query::DEFAULT_MAX_CONCURRENCY;
use crate::session::PoolOptions;

#[derive(Parser, Debug, Clone)]
#[command(name = "sqlframe")]
#[command(about = "Run a batch of SQL queries against SQLite and print typed result frames as JSON", long_about = None)]
pub struct Config {
    // Basic configuration
    #[arg(short, long, default_value = "sqlite.db", env = "SQLFRAME_DATABASE")]
    pub database: String,

    #[arg(long, default_value = "info", env = "SQLFRAME_LOG_LEVEL")]
    pub log_level: String,

    #[arg(short, long, default_value = "-", env = "SQLFRAME_INPUT", help = "Batch request JSON file, '-' for stdin")]
    pub input: String,

    #[arg(long, env = "SQLFRAME_PRETTY", help = "Pretty-print the batch result")]
    pub pretty: bool,

    // Execution
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY, env = "SQLFRAME_MAX_CONCURRENCY", help = "Maximum number of queries running at once")]
    pub max_concurrency: usize,

    // Pool configuration
    #[arg(long, default_value = "10", env = "SQLFRAME_MAX_OPEN_CONNS", help = "Maximum number of borrowed connections")]
    pub max_open_conns: usize,

    #[arg(long, default_value = "5", env = "SQLFRAME_MAX_IDLE_CONNS", help = "Maximum number of idle connections kept for reuse")]
    pub max_idle_conns: usize,

    #[arg(long, env = "SQLFRAME_MAX_IDLE_TIME_SECS", help = "Close connections idle for longer than this many seconds")]
    pub max_idle_time: Option<u64>,

    #[arg(long, env = "SQLFRAME_MAX_LIFETIME_SECS", help = "Close connections older than this many seconds")]
    pub max_lifetime: Option<u64>,

    // SQLite PRAGMA settings
    #[arg(long, default_value = "WAL", env = "SQLFRAME_JOURNAL_MODE", help = "SQLite journal mode (WAL, DELETE, TRUNCATE, etc.)")]
    pub pragma_journal_mode: String,

    #[arg(long, default_value = "NORMAL", env = "SQLFRAME_SYNCHRONOUS", help = "SQLite synchronous mode (NORMAL, FULL, OFF)")]
    pub pragma_synchronous: String,

    #[arg(long, default_value = "5000", env = "SQLFRAME_BUSY_TIMEOUT_MS", help = "How long to wait on a locked database in milliseconds")]
    pub busy_timeout_ms: u64,
}

impl Config {
    /// Get a configuration instance with all values resolved from CLI args and environment variables
    pub fn load() -> Self {
        Config::parse()
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            path: self.database.clone(),
            max_open_conns: self.max_open_conns,
            max_idle_conns: self.max_idle_conns,
            max_idle_time: self.max_idle_time.map(Duration::from_secs),
            max_lifetime: self.max_lifetime.map(Duration::from_secs),
            journal_mode: self.pragma_journal_mode.clone(),
            synchronous: self.pragma_synchronous.clone(),
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}
