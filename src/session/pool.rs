use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::PoolError;

/// Sizing and per-connection settings of a [`SqlitePool`]
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub path: String,
    pub max_open_conns: usize,
    pub max_idle_conns: usize,
    pub max_idle_time: Option<Duration>,
    pub max_lifetime: Option<Duration>,
    pub journal_mode: String,
    pub synchronous: String,
    pub busy_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            max_open_conns: 10,
            max_idle_conns: 5,
            max_idle_time: None,
            max_lifetime: None,
            journal_mode: "WAL".to_string(),
            synchronous: "NORMAL".to_string(),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolOptions {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Self::default() }
    }
}

/// Snapshot of pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub opened: usize,
    pub borrowed: usize,
    pub returned: usize,
    pub closed: usize,
    pub idle: usize,
}

impl PoolStats {
    pub fn in_use(&self) -> usize {
        // Counters are read one at a time, so a snapshot may see a return
        // before its borrow
        self.borrowed.saturating_sub(self.returned)
    }
}

struct IdleConnection {
    conn: Connection,
    created_at: Instant,
    idle_since: Instant,
}

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    borrowed: AtomicUsize,
    returned: AtomicUsize,
    closed: AtomicUsize,
}

struct PoolInner {
    options: PoolOptions,
    idle: Mutex<Vec<IdleConnection>>,
    semaphore: Arc<Semaphore>,
    counters: Counters,
}

impl PoolInner {
    fn is_expired(&self, created_at: Instant, idle_since: Option<Instant>) -> bool {
        let now = Instant::now();
        if self.options.max_lifetime.is_some_and(|max| now.duration_since(created_at) >= max) {
            return true;
        }
        match (self.options.max_idle_time, idle_since) {
            (Some(max), Some(since)) => now.duration_since(since) >= max,
            _ => false,
        }
    }

    fn open_connection(&self) -> Result<Connection, PoolError> {
        let path = &self.options.path;
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_URI;
            Connection::open_with_flags(path, flags)
        }
        .map_err(|source| PoolError::Open { path: path.clone(), source })?;

        let pragma_sql = format!(
            "PRAGMA journal_mode = {};
             PRAGMA synchronous = {};
             PRAGMA temp_store = MEMORY;",
            self.options.journal_mode, self.options.synchronous
        );
        conn.execute_batch(&pragma_sql).map_err(PoolError::Configure)?;
        conn.busy_timeout(self.options.busy_timeout).map_err(PoolError::Configure)?;

        let opened = self.counters.opened.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Opened connection to {} (total opened: {})", path, opened);
        Ok(conn)
    }

    fn release(&self, conn: Connection, created_at: Instant) {
        self.counters.returned.fetch_add(1, Ordering::Relaxed);

        let mut idle = self.idle.lock();
        if self.semaphore.is_closed() || idle.len() >= self.options.max_idle_conns || self.is_expired(created_at, None) {
            drop(idle);
            self.counters.closed.fetch_add(1, Ordering::Relaxed);
            drop(conn);
            return;
        }
        idle.push(IdleConnection { conn, created_at, idle_since: Instant::now() });
    }
}

/// Bounded pool of SQLite connections.
///
/// At most `max_open_conns` connections are borrowed at once; returned
/// connections are kept for reuse up to `max_idle_conns`.
#[derive(Clone)]
pub struct SqlitePool {
    inner: Arc<PoolInner>,
}

impl SqlitePool {
    pub fn new(options: PoolOptions) -> Self {
        let permits = options.max_open_conns.max(1);
        Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(permits)),
                idle: Mutex::new(Vec::new()),
                counters: Counters::default(),
                options,
            }),
        }
    }

    /// Open a pool and check that one connection can be established
    pub fn open(options: PoolOptions) -> crate::Result<Self> {
        let pool = Self::new(options);
        let conn = pool.inner.open_connection()?;
        pool.inner.idle.lock().push(IdleConnection {
            conn,
            created_at: Instant::now(),
            idle_since: Instant::now(),
        });
        Ok(pool)
    }

    pub async fn acquire(&self) -> Result<PooledConnection, PoolError> {
        let permit = self
            .inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        self.checkout(permit)
    }

    /// Like [`acquire`](Self::acquire) but gives up as soon as `cancel` fires
    pub async fn acquire_with_cancel(&self, cancel: &CancellationToken) -> Result<PooledConnection, PoolError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PoolError::Cancelled),
            conn = self.acquire() => conn,
        }
    }

    fn checkout(&self, permit: OwnedSemaphorePermit) -> Result<PooledConnection, PoolError> {
        let reused = {
            let mut idle = self.inner.idle.lock();
            let mut found = None;
            while let Some(candidate) = idle.pop() {
                if self.inner.is_expired(candidate.created_at, Some(candidate.idle_since)) {
                    self.inner.counters.closed.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                found = Some(candidate);
                break;
            }
            found
        };

        let (conn, created_at) = match reused {
            Some(idle) => (idle.conn, idle.created_at),
            None => (self.inner.open_connection()?, Instant::now()),
        };

        self.inner.counters.borrowed.fetch_add(1, Ordering::Relaxed);
        Ok(PooledConnection {
            conn: Some(conn),
            created_at,
            pool: self.inner.clone(),
            _permit: permit,
        })
    }

    pub fn stats(&self) -> PoolStats {
        let counters = &self.inner.counters;
        PoolStats {
            opened: counters.opened.load(Ordering::Relaxed),
            borrowed: counters.borrowed.load(Ordering::Relaxed),
            returned: counters.returned.load(Ordering::Relaxed),
            closed: counters.closed.load(Ordering::Relaxed),
            idle: self.inner.idle.lock().len(),
        }
    }

    /// Refuse new borrowers and drop idle connections
    pub fn close(&self) {
        self.inner.semaphore.close();
        let drained = std::mem::take(&mut *self.inner.idle.lock());
        self.inner.counters.closed.fetch_add(drained.len(), Ordering::Relaxed);
    }
}

/// A borrowed connection, handed back to its pool when dropped
pub struct PooledConnection {
    conn: Option<Connection>,
    created_at: Instant,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl std::ops::Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        // Only `Drop` takes the connection out
        self.conn.as_ref().unwrap()
    }
}

impl std::ops::DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().unwrap()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.created_at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_is_reused() {
        let pool = SqlitePool::new(PoolOptions::default());
        {
            let conn = pool.acquire().await.unwrap();
            conn.execute_batch("SELECT 1").unwrap();
        }
        {
            let _conn = pool.acquire().await.unwrap();
        }
        let stats = pool.stats();
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.borrowed, 2);
        assert_eq!(stats.returned, 2);
        assert_eq!(stats.in_use(), 0);
        assert_eq!(stats.idle, 1);
    }

    #[tokio::test]
    async fn test_max_open_bounds_borrowers() {
        let pool = SqlitePool::new(PoolOptions { max_open_conns: 1, ..PoolOptions::default() });
        let first = pool.acquire().await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(blocked.is_err());

        drop(first);
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_idle_limit_closes_surplus() {
        let pool = SqlitePool::new(PoolOptions { max_idle_conns: 1, ..PoolOptions::default() });
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        drop(a);
        drop(b);
        let stats = pool.stats();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.closed, 1);
    }

    #[tokio::test]
    async fn test_expired_idle_connection_is_replaced() {
        let pool = SqlitePool::new(PoolOptions {
            max_idle_time: Some(Duration::from_millis(1)),
            ..PoolOptions::default()
        });
        drop(pool.acquire().await.unwrap());
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(pool.acquire().await.unwrap());
        assert_eq!(pool.stats().opened, 2);
    }

    #[tokio::test]
    async fn test_acquire_cancelled() {
        let pool = SqlitePool::new(PoolOptions { max_open_conns: 1, ..PoolOptions::default() });
        let _held = pool.acquire().await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(pool.acquire_with_cancel(&cancel).await, Err(PoolError::Cancelled)));
    }

    #[tokio::test]
    async fn test_open_failure() {
        let pool = SqlitePool::new(PoolOptions::new("/nonexistent-dir/sub/db.sqlite"));
        assert!(matches!(pool.acquire().await, Err(PoolError::Open { .. })));
        assert_eq!(pool.stats().borrowed, 0);
    }

    #[test]
    fn test_open_checks_connection() {
        let pool = SqlitePool::open(PoolOptions::default()).unwrap();
        assert_eq!(pool.stats().opened, 1);
        assert_eq!(pool.stats().idle, 1);

        let err = SqlitePool::open(PoolOptions::new("/nonexistent-dir/sub/db.sqlite")).err();
        assert!(matches!(err, Some(crate::SqlFrameError::Pool(PoolError::Open { .. }))));
    }

    #[test]
    fn test_in_use_never_underflows() {
        let stats = PoolStats { borrowed: 3, returned: 4, ..PoolStats::default() };
        assert_eq!(stats.in_use(), 0);
        let stats = PoolStats { borrowed: 5, returned: 2, ..PoolStats::default() };
        assert_eq!(stats.in_use(), 3);
    }

    #[tokio::test]
    async fn test_closed_pool() {
        let pool = SqlitePool::new(PoolOptions::default());
        pool.close();
        assert!(matches!(pool.acquire().await, Err(PoolError::Closed)));
    }
}
