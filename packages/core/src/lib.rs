//! SpotGraph Core - pose lattice storage and access layer
//!
//! This crate persists a legged robot's discretized pose space as a graph:
//! every node is a 6-DOF pose plus joint configuration, linked to its
//! neighbors along twelve directions (six translational, six rotational).
//!
//! # Architecture
//!
//! - **Pose identity**: `(x, y, z, rx, ry, rz)` is unique across the store,
//!   enforced by a store-level constraint rather than by application locks
//! - **libsql**: local SQLite-compatible file or remote libsql server
//! - **Bounded pool**: callers queue for connections instead of failing
//! - **Explicit symmetry**: link updates never mirror themselves
//!
//! # Modules
//!
//! - [`models`] - Data structures (SpotNode, Pose, Direction, LinkEdge)
//! - [`services`] - Identity resolver, link manager, bulk writer, `SpotGraph` facade
//! - [`db`] - Connection pool, schema, provisioning
//! - [`config`] - Store configuration

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::{LinkPolicy, StoreConfig};
pub use models::*;
pub use services::{GraphError, GraphStore, SpotGraph};
