pub mod config;
pub mod error;
pub mod frame;
pub mod health;
pub mod query;
pub mod session;
pub mod settings;
pub mod types;

pub use error::{FrameError, PoolError, QueryError, SettingsError, SplitError};
pub use frame::{BatchRequest, BatchResult, Column, QueryOutcome, QuerySpec, ResultFrame};
pub use query::{QueryExecutor, QueryOrchestrator};
pub use session::{PoolOptions, PooledConnection, SqlitePool};
pub use types::{Cell, SemanticKind};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqlFrameError {
    #[error("Connection pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, SqlFrameError>;
