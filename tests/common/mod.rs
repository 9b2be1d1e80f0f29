use sqlframe::session::{PoolOptions, SqlitePool};
use tempfile::TempDir;

/// A file-backed database shared by every connection of its pool
pub struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

/// Create a database in a temp directory and run `init` on it
pub fn setup_test_db(init: &str) -> TestDb {
    setup_test_db_with(init, |options| options)
}

#[allow(dead_code)]
pub fn setup_test_db_with(init: &str, configure: impl FnOnce(PoolOptions) -> PoolOptions) -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");

    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(init).unwrap();
    drop(conn);

    let options = configure(PoolOptions::new(path.to_string_lossy().to_string()));
    TestDb {
        pool: SqlitePool::new(options),
        _dir: dir,
    }
}

/// Sensor readings with a mix of kinds and NULLs
#[allow(dead_code)]
pub const SENSOR_SCHEMA: &str = "
    CREATE TABLE readings (
        id INTEGER PRIMARY KEY,
        sensor TEXT NOT NULL,
        active BOOLEAN,
        value REAL,
        taken_at TIMESTAMP
    );
    INSERT INTO readings VALUES (1, 'north', 1, 21.5, '2024-05-01 10:00:00');
    INSERT INTO readings VALUES (2, 'south', 0, NULL, '2024-05-01 10:05:00');
    INSERT INTO readings VALUES (3, 'east', NULL, 19.25, NULL);
";

/// A statement that only ends when interrupted
#[allow(dead_code)]
pub const ENDLESS_QUERY: &str =
    "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT count(*) AS n FROM c";
