//! Database Layer
//!
//! This module handles all store interactions using libsql:
//!
//! - Bounded connection pool with scoped checkout (`ConnectionPool`)
//! - Schema creation for the `nodes` relation
//! - Database provisioning (run once before connecting)
//! - Fault points for exercising partial-failure paths
//!
//! # Architecture
//!
//! The store is either a local SQLite-compatible file or a remote libsql
//! server; both speak the same SQL. Every graph operation checks a connection
//! out of the pool, runs its transaction, and returns the connection on drop.

mod error;
pub mod fault_injection;
mod pool;
pub mod provision;
pub mod schema;

pub use error::DatabaseError;
pub use fault_injection::{FaultInjector, FaultPoint};
pub use pool::{ConnectionPool, PooledConnection};
pub(crate) use pool::rollback_quietly;
pub use provision::{provision_databases, ProvisionReport};
pub use schema::create_tables;
