// Module for connection management
pub mod pool;

pub use pool::{PoolOptions, PoolStats, PooledConnection, SqlitePool};
