//! Bounded DuckDB connection pool
//!
//! All connections are clones of one database handle, so they see the same
//! tables. A semaphore caps how many are checked out at once; `acquire` waits
//! when the pool is exhausted.

use std::ops::Deref;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use duckdb::Connection;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::error::ExecutionError;

pub const DEFAULT_MAX_CONNECTIONS: usize = 5;

/// Where the executor gets its connections from
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    /// Connection handle, released when dropped
    type Handle: Deref<Target = Connection> + Send + 'static;

    async fn acquire(&self) -> Result<Self::Handle, ExecutionError>;
}

struct PoolInner {
    /// Handle every pooled connection is cloned from
    root: Mutex<Connection>,
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
    max_connections: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>, max_connections: usize) -> Result<Self, ExecutionError> {
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn, max_connections))
    }

    pub fn open_in_memory(max_connections: usize) -> Result<Self, ExecutionError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn, max_connections))
    }

    /// `:memory:` or an empty path opens an in-memory database
    pub fn open_url(url: &str, max_connections: usize) -> Result<Self, ExecutionError> {
        if url.is_empty() || url == ":memory:" {
            Self::open_in_memory(max_connections)
        } else {
            Self::open(url, max_connections)
        }
    }

    pub fn from_connection(conn: Connection, max_connections: usize) -> Self {
        let max_connections = max_connections.max(1);
        Self {
            inner: Arc::new(PoolInner {
                root: Mutex::new(conn),
                idle: Mutex::new(Vec::new()),
                permits: Arc::new(Semaphore::new(max_connections)),
                max_connections,
            }),
        }
    }

    pub fn max_connections(&self) -> usize {
        self.inner.max_connections
    }

    /// Connections that can be checked out without waiting
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Run `f` against the root handle, for setup and introspection
    pub fn with_root<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let root = lock(&self.inner.root);
        f(&root)
    }

    /// Wait for a free slot and check out a connection
    pub async fn acquire(&self) -> Result<PooledConnection, ExecutionError> {
        let permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ExecutionError::PoolClosed)?;

        let reused = lock(&self.inner.idle).pop();
        let conn = match reused {
            Some(conn) => conn,
            None => {
                debug!(max = self.inner.max_connections, "Opening pooled connection");
                lock(&self.inner.root).try_clone()?
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Refuse further checkouts; waiters fail with [`ExecutionError::PoolClosed`]
    pub fn close(&self) {
        self.inner.permits.close();
    }
}

#[async_trait]
impl ConnectionSource for ConnectionPool {
    type Handle = PooledConnection;

    async fn acquire(&self) -> Result<PooledConnection, ExecutionError> {
        ConnectionPool::acquire(self).await
    }
}

/// Checked-out connection; goes back to the pool on drop
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
    // Released after the connection is back in the idle list
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection is present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            lock(&self.pool.idle).push(conn);
        }
    }
}
