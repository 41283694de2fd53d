//! SpotGraph - the access facade
//!
//! `SpotGraph` owns the connection pool and composes the identity resolver,
//! link manager and bulk writer behind the `GraphStore` trait. It is the only
//! entry point external callers use; no raw SQL leaves this crate.
//!
//! # Lifecycle
//!
//! 1. `SpotGraph::connect(config)` validates the config, opens the pool
//!    (failing fast with `StoreUnavailable`), and ensures the schema
//! 2. Operations check connections out of the pool as needed
//! 3. `close()` shuts the pool down; later operations fail with `StoreUnavailable`
//!
//! # Examples
//!
//! ```rust,no_run
//! use spotgraph_core::config::StoreConfig;
//! use spotgraph_core::models::{Direction, LinkEdge, SpotNode};
//! use spotgraph_core::services::{GraphStore, SpotGraph};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let graph = SpotGraph::connect(StoreConfig::from_url("./data/spot.db")).await?;
//!
//!     let a = graph.add_node(&SpotNode::new(&[0.0, 0.0, 0.2], &[0.0; 3], None)?).await?;
//!     let b = graph.add_node(&SpotNode::new(&[0.0, 0.0, 0.3], &[0.0; 3], None)?).await?;
//!
//!     // Symmetric link: both halves in one transaction
//!     graph
//!         .set_links_bulk(&LinkEdge::bidirectional(a, Direction::Up, b))
//!         .await?;
//!
//!     graph.close();
//!     Ok(())
//! }
//! ```

use crate::config::{StoreConfig, StoreLocation};
use crate::db::schema::{create_tables, node_columns, row_to_node};
use crate::db::{ConnectionPool, FaultInjector};
use crate::models::{Direction, LinkEdge, Links, NodeId, Pose, PoseKey, SpotNode};
use crate::services::bulk_writer::BulkWriter;
use crate::services::error::{GraphError, Result};
use crate::services::identity_resolver::IdentityResolver;
use crate::services::link_manager::LinkManager;
use async_trait::async_trait;
use libsql::params;
use std::collections::HashMap;
use std::sync::Arc;

/// Typed operations over the pose lattice
///
/// Implementations must be `Send + Sync`; callers typically hold an
/// `Arc<dyn GraphStore>` and issue operations from many tasks at once.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create-or-get a single node, returning its id
    async fn add_node(&self, node: &SpotNode) -> Result<NodeId>;

    /// Create-or-get many nodes in chunks, returning ids in input order
    async fn add_nodes_bulk(&self, nodes: &[SpotNode]) -> Result<Vec<NodeId>>;

    /// Set one directional link field
    async fn set_link(&self, node_id: NodeId, direction: Direction, target_id: NodeId)
        -> Result<()>;

    /// Set many link fields atomically, returning how many were applied
    async fn set_links_bulk(&self, edges: &[LinkEdge]) -> Result<usize>;

    /// Look up a node id by pose; `None` when the pose was never stored
    async fn find_node(&self, pose: &Pose) -> Result<Option<NodeId>>;

    /// Read a full node by id
    async fn get_node(&self, node_id: NodeId) -> Result<Option<SpotNode>>;

    /// Read the twelve link fields of a node
    async fn neighbors(&self, node_id: NodeId) -> Result<Option<Links>>;
}

pub struct SpotGraph {
    config: StoreConfig,
    pool: Arc<ConnectionPool>,
    faults: Arc<FaultInjector>,
    identity: IdentityResolver,
    links: LinkManager,
    bulk: BulkWriter,
}

impl SpotGraph {
    /// Connect to the store described by `config` and ensure the schema
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if `config.validate()` fails (no I/O is attempted)
    /// - `StoreUnavailable` if the initial connection cannot be established
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        config.validate().map_err(GraphError::InvalidConfig)?;

        let pool = Arc::new(ConnectionPool::open(&config).await?);
        let faults = Arc::new(FaultInjector::new());

        let graph = Self {
            identity: IdentityResolver::new(Arc::clone(&pool)),
            links: LinkManager::new(Arc::clone(&pool), config.link_policy, Arc::clone(&faults)),
            bulk: BulkWriter::new(Arc::clone(&pool), config.chunk_size, Arc::clone(&faults)),
            config,
            pool,
            faults,
        };

        graph.create_tables().await?;
        Ok(graph)
    }

    /// Ensure the `nodes` table exists (idempotent)
    pub async fn create_tables(&self) -> Result<()> {
        let is_local = matches!(self.config.location(), Ok(StoreLocation::Local(_)));
        let conn = self.pool.acquire().await?;
        create_tables(&conn, is_local).await?;
        Ok(())
    }

    /// Shut the connection pool down
    pub fn close(&self) {
        self.pool.close();
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Connections that can be checked out right now without waiting
    pub fn available_connections(&self) -> usize {
        self.pool.available()
    }

    /// Fault points for this instance (used to exercise partial failures)
    pub fn fault_injector(&self) -> &FaultInjector {
        &self.faults
    }

    /// Every stored pose mapped to its node id
    pub async fn all_node_keys(&self) -> Result<HashMap<PoseKey, NodeId>> {
        let conn = self.pool.acquire().await?;
        let mut rows = conn
            .query("SELECT id, x, y, z, rx, ry, rz FROM nodes", ())
            .await?;

        let mut keys = HashMap::new();
        while let Some(row) = rows.next().await? {
            let id = NodeId(row.get(0)?);
            let mut coordinates = [0.0; 6];
            for (i, c) in coordinates.iter_mut().enumerate() {
                *c = row.get::<f64>(i as i32 + 1)?;
            }
            keys.insert(Pose::from_coordinates(coordinates)?.key(), id);
        }
        Ok(keys)
    }

    pub async fn node_count(&self) -> Result<u64> {
        let conn = self.pool.acquire().await?;
        let mut rows = conn.query("SELECT COUNT(*) FROM nodes", ()).await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl GraphStore for SpotGraph {
    async fn add_node(&self, node: &SpotNode) -> Result<NodeId> {
        self.identity
            .create_or_get(&node.pose, &node.joint_angle)
            .await
    }

    async fn add_nodes_bulk(&self, nodes: &[SpotNode]) -> Result<Vec<NodeId>> {
        self.bulk.add_nodes_bulk(nodes).await
    }

    async fn set_link(
        &self,
        node_id: NodeId,
        direction: Direction,
        target_id: NodeId,
    ) -> Result<()> {
        self.links.set_link(node_id, direction, target_id).await
    }

    async fn set_links_bulk(&self, edges: &[LinkEdge]) -> Result<usize> {
        self.links.set_links_bulk(edges).await
    }

    async fn find_node(&self, pose: &Pose) -> Result<Option<NodeId>> {
        self.identity.find(pose).await
    }

    async fn get_node(&self, node_id: NodeId) -> Result<Option<SpotNode>> {
        let sql = format!("SELECT {} FROM nodes WHERE id = ?1", node_columns());
        let conn = self.pool.acquire().await?;
        let mut rows = conn.query(&sql, params![node_id.get()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_node(&row)?)),
            None => Ok(None),
        }
    }

    async fn neighbors(&self, node_id: NodeId) -> Result<Option<Links>> {
        self.links.neighbors(node_id).await
    }
}

impl std::fmt::Debug for SpotGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotGraph")
            .field("pool", &self.pool)
            .field("chunk_size", &self.bulk.chunk_size())
            .field("link_policy", &self.config.link_policy)
            .finish()
    }
}
