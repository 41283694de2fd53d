//! Database Error Types
//!
//! This module defines error types for store-level operations: opening the
//! store, checking connections out of the pool, and executing SQL.

use std::path::PathBuf;
use thiserror::Error;

/// Database operation errors
///
/// Service-layer code converts these into `GraphError`; connection and pool
/// failures become `GraphError::StoreUnavailable`.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open the store
    #[error("Failed to connect to database at {location}: {source}")]
    ConnectionFailed {
        location: String,
        source: libsql::Error,
    },

    /// The pool was shut down
    #[error("Connection pool is closed")]
    PoolClosed,

    /// No connection became available within the configured wait
    #[error("Timed out after {waited_ms}ms waiting for a pooled connection")]
    AcquireTimeout { waited_ms: u64 },

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// Database name is not usable as a file name
    #[error("Invalid database name: '{name}'")]
    InvalidDatabaseName { name: String },

    /// Connection string could not be parsed
    #[error("Invalid database url: {reason}")]
    InvalidUrl { reason: String },

    /// Provisioning target exists but is not a directory
    #[error("Invalid data directory: {path}")]
    InvalidPath { path: PathBuf },

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// Failure raised by a configured fault point
    #[error("Fault injected at {0}")]
    FaultInjected(String),
}

impl DatabaseError {
    /// Create a connection failed error
    pub fn connection_failed(location: impl Into<String>, source: libsql::Error) -> Self {
        Self::ConnectionFailed {
            location: location.into(),
            source,
        }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    /// Whether the store itself could not be reached
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::PoolClosed | Self::AcquireTimeout { .. }
        )
    }
}
