//! Connection Pool
//!
//! A bounded pool of libsql connections shared by every graph operation.
//!
//! # Behavior
//!
//! - At most `max_connections` connections are checked out at once; further
//!   callers wait (suspend) on a semaphore for up to `acquire_timeout_ms`
//!   before failing with `DatabaseError::AcquireTimeout`.
//! - Connections are returned to an idle list when their `PooledConnection`
//!   guard drops. A connection that still has a transaction open (the owning
//!   future was cancelled mid-transaction) is discarded instead; closing it
//!   rolls the transaction back.
//! - Local connections get `PRAGMA busy_timeout` and `PRAGMA foreign_keys = ON`
//!   when they are opened, so concurrent writers queue on the file lock
//!   instead of failing with `SQLITE_BUSY`.
//!
//! # Examples
//!
//! ```no_run
//! # use spotgraph_core::config::StoreConfig;
//! # use spotgraph_core::db::ConnectionPool;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = ConnectionPool::open(&StoreConfig::from_url("./data/spot.db")).await?;
//! {
//!     let conn = pool.acquire().await?;
//!     conn.execute("SELECT 1", ()).await?;
//! } // connection goes back to the pool here
//! pool.close();
//! # Ok(())
//! # }
//! ```

use crate::config::{StoreConfig, StoreLocation};
use crate::db::error::DatabaseError;
use libsql::{Builder, Connection, Database, Transaction, TransactionBehavior};
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded pool of store connections
pub struct ConnectionPool {
    db: Database,
    location: StoreLocation,
    permits: Arc<Semaphore>,
    idle: Arc<Mutex<Vec<Connection>>>,
    max_connections: usize,
    acquire_timeout: Duration,
    busy_timeout_ms: u64,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("location", &self.location)
            .field("max_connections", &self.max_connections)
            .field("available", &self.available())
            .finish()
    }
}

impl ConnectionPool {
    /// Open the store and verify that a connection can run a query
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::ConnectionFailed` if the store cannot be opened
    /// or the probe query fails, and `DirectoryCreationFailed` if the parent
    /// directory of a local database cannot be created.
    pub async fn open(config: &StoreConfig) -> Result<Self, DatabaseError> {
        let location = config
            .location()
            .map_err(|reason| DatabaseError::InvalidUrl { reason })?;

        let db = match &location {
            StoreLocation::Local(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                Builder::new_local(path)
                    .build()
                    .await
                    .map_err(|e| DatabaseError::connection_failed(path.display().to_string(), e))?
            }
            StoreLocation::Remote { url, auth_token } => {
                Builder::new_remote(url.clone(), auth_token.clone())
                    .build()
                    .await
                    .map_err(|e| DatabaseError::connection_failed(url.clone(), e))?
            }
        };

        let pool = Self {
            db,
            location,
            permits: Arc::new(Semaphore::new(config.max_connections)),
            idle: Arc::new(Mutex::new(Vec::new())),
            max_connections: config.max_connections,
            acquire_timeout: Duration::from_millis(config.acquire_timeout_ms),
            busy_timeout_ms: config.busy_timeout_ms,
        };

        // Fail fast: remote builders do not touch the network until first use
        let probe = pool.acquire().await.map_err(|e| match e {
            DatabaseError::LibsqlError(source) => {
                DatabaseError::connection_failed(pool.describe(), source)
            }
            other => other,
        })?;
        probe
            .query("SELECT 1", ())
            .await
            .map_err(|e| DatabaseError::connection_failed(pool.describe(), e))?;
        drop(probe);

        tracing::info!(
            "Opened store at {} (max_connections={})",
            pool.describe(),
            pool.max_connections
        );

        Ok(pool)
    }

    /// Check a connection out of the pool, waiting if all are in use
    pub async fn acquire(&self) -> Result<PooledConnection, DatabaseError> {
        let permit = match tokio::time::timeout(
            self.acquire_timeout,
            Arc::clone(&self.permits).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(DatabaseError::PoolClosed),
            Err(_) => {
                tracing::warn!(
                    "Connection pool exhausted for {}ms ({} connections in use)",
                    self.acquire_timeout.as_millis(),
                    self.max_connections
                );
                return Err(DatabaseError::AcquireTimeout {
                    waited_ms: self.acquire_timeout.as_millis() as u64,
                });
            }
        };

        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let conn = match reused {
            Some(conn) => conn,
            None => self.open_connection().await?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            idle: Arc::clone(&self.idle),
            permits: Arc::clone(&self.permits),
            _permit: permit,
        })
    }

    /// Shut the pool down
    ///
    /// Waiting and future `acquire` calls fail with `PoolClosed`; idle
    /// connections are closed now, checked-out ones when they are returned.
    pub fn close(&self) {
        self.permits.close();
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::info!("Closed connection pool for {}", self.describe());
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Connections that can be checked out without waiting
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    fn describe(&self) -> String {
        match &self.location {
            StoreLocation::Local(path) => path.display().to_string(),
            StoreLocation::Remote { url, .. } => url.clone(),
        }
    }

    async fn open_connection(&self) -> Result<Connection, DatabaseError> {
        let conn = self.db.connect()?;

        if let StoreLocation::Local(_) = self.location {
            execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms))
                .await?;
            execute_pragma(&conn, "PRAGMA foreign_keys = ON").await?;
        }

        Ok(conn)
    }
}

/// Execute a PRAGMA statement
///
/// PRAGMA statements may return rows, so they go through `query()`.
pub(crate) async fn execute_pragma(conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
    conn.query(pragma, ())
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e)))?;
    Ok(())
}

/// Connection checked out of a `ConnectionPool`
///
/// Dereferences to `libsql::Connection` and returns to the pool on drop.
pub struct PooledConnection {
    conn: Option<Connection>,
    idle: Arc<Mutex<Vec<Connection>>>,
    permits: Arc<Semaphore>,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}

impl PooledConnection {
    /// Start a write transaction that takes the store's write lock up front
    pub async fn begin_immediate(&self) -> Result<Transaction, DatabaseError> {
        self.transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e)))
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `Drop` takes the connection out
        self.conn.as_ref().unwrap_or_else(|| unreachable!("connection taken before drop"))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        if self.permits.is_closed() {
            return;
        }

        if !conn.is_autocommit() {
            tracing::debug!("Discarding pooled connection with an open transaction");
            return;
        }

        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(conn);
    }
}

/// Roll back after a failure without masking the original error
pub(crate) async fn rollback_quietly(tx: Transaction) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!("Rollback failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir, max_connections: usize, acquire_timeout_ms: u64) -> StoreConfig {
        StoreConfig {
            max_connections,
            acquire_timeout_ms,
            ..StoreConfig::from_url(dir.path().join("pool.db").display().to_string())
        }
    }

    #[tokio::test]
    async fn test_connections_are_returned_on_drop() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::open(&config_in(&dir, 2, 1_000)).await.unwrap();

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);

        drop(a);
        assert_eq!(pool.available(), 1);
        drop(b);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_pool_times_out() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::open(&config_in(&dir, 1, 50)).await.unwrap();

        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, DatabaseError::AcquireTimeout { waited_ms: 50 }));
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_waiting_caller_gets_released_connection() {
        let dir = TempDir::new().unwrap();
        let pool = Arc::new(ConnectionPool::open(&config_in(&dir, 1, 5_000)).await.unwrap());

        let held = pool.acquire().await.unwrap();
        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_acquire() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::open(&config_in(&dir, 2, 1_000)).await.unwrap();

        pool.close();
        assert!(pool.is_closed());
        assert!(matches!(
            pool.acquire().await.unwrap_err(),
            DatabaseError::PoolClosed
        ));
    }

    #[tokio::test]
    async fn test_open_transaction_is_not_reused() {
        let dir = TempDir::new().unwrap();
        let pool = ConnectionPool::open(&config_in(&dir, 1, 1_000)).await.unwrap();

        {
            let conn = pool.acquire().await.unwrap();
            conn.execute("CREATE TABLE t (v INTEGER)", ()).await.unwrap();
            conn.execute("BEGIN IMMEDIATE", ()).await.unwrap();
            conn.execute("INSERT INTO t (v) VALUES (1)", ()).await.unwrap();
            // dropped without COMMIT
        }

        let conn = pool.acquire().await.unwrap();
        assert!(conn.is_autocommit());
        let mut rows = conn.query("SELECT COUNT(*) FROM t", ()).await.unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 0);
    }
}
