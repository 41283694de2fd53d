//! Link Manager
//!
//! Sets the twelve directional link fields. Every update checks that both
//! endpoints exist inside the same transaction that writes the field, so no
//! completed operation leaves a dangling reference.
//!
//! The manager is a plain field setter: `A.up = B` never writes `B.down = A`.
//! Callers wanting symmetric links submit both edges, normally via
//! `LinkEdge::bidirectional` in a single `set_links_bulk` call.

use crate::config::LinkPolicy;
use crate::db::schema::row_to_links;
use crate::db::{rollback_quietly, ConnectionPool, FaultInjector, FaultPoint};
use crate::models::{Direction, LinkEdge, Links, NodeId};
use crate::services::error::{GraphError, Result};
use libsql::{params, Connection};
use std::sync::Arc;

pub struct LinkManager {
    pool: Arc<ConnectionPool>,
    policy: LinkPolicy,
    faults: Arc<FaultInjector>,
}

impl LinkManager {
    pub fn new(pool: Arc<ConnectionPool>, policy: LinkPolicy, faults: Arc<FaultInjector>) -> Self {
        Self {
            pool,
            policy,
            faults,
        }
    }

    /// Set `node_id.direction = target_id`
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` if `node_id` or `target_id` does not exist
    /// - `LinkAlreadySet` under `LinkPolicy::RejectIfSet` when the field holds another id
    pub async fn set_link(
        &self,
        node_id: NodeId,
        direction: Direction,
        target_id: NodeId,
    ) -> Result<()> {
        let edge = LinkEdge::new(node_id, direction, target_id);

        let conn = self.pool.acquire().await?;
        let tx = conn.begin_immediate().await?;

        match apply_edge(&tx, &edge, self.policy).await {
            Ok(()) => {
                tx.commit().await?;
                tracing::debug!("Linked {}.{} -> {}", node_id, direction, target_id);
                Ok(())
            }
            Err(e) => {
                rollback_quietly(tx).await;
                Err(e)
            }
        }
    }

    /// Apply every edge in one transaction, or none of them
    ///
    /// Returns the number of edges applied. The first failing edge rolls the
    /// whole batch back and is reported as `BulkLinkFailure { index, .. }`.
    pub async fn set_links_bulk(&self, edges: &[LinkEdge]) -> Result<usize> {
        if edges.is_empty() {
            return Ok(0);
        }

        let conn = self.pool.acquire().await?;
        let tx = conn.begin_immediate().await?;

        for (index, edge) in edges.iter().enumerate() {
            let applied = match self.faults.check(FaultPoint::BulkLinkEdge).await {
                Ok(()) => apply_edge(&tx, edge, self.policy).await,
                Err(e) => Err(e.into()),
            };

            if let Err(e) = applied {
                tracing::warn!(
                    "Bulk link batch of {} edges rolled back at edge {}: {}",
                    edges.len(),
                    index,
                    e
                );
                rollback_quietly(tx).await;
                return Err(GraphError::BulkLinkFailure {
                    index,
                    source: Box::new(e),
                });
            }
        }

        tx.commit().await?;
        tracing::debug!("Applied {} link updates", edges.len());
        Ok(edges.len())
    }

    /// Current link fields of `node_id`, or `None` if the node does not exist
    pub async fn neighbors(&self, node_id: NodeId) -> Result<Option<Links>> {
        let columns = Direction::ALL
            .iter()
            .map(|d| d.column())
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {} FROM nodes WHERE id = ?1", columns);

        let conn = self.pool.acquire().await?;
        let mut rows = conn.query(&sql, params![node_id.get()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_links(&row, 0)?)),
            None => Ok(None),
        }
    }
}

/// Write one edge inside an open transaction
async fn apply_edge(conn: &Connection, edge: &LinkEdge, policy: LinkPolicy) -> Result<()> {
    let column = edge.direction.column();

    let select = format!("SELECT {} FROM nodes WHERE id = ?1", column);
    let mut rows = conn.query(&select, params![edge.node_id.get()]).await?;
    let current: Option<i64> = match rows.next().await? {
        Some(row) => row.get(0)?,
        None => return Err(GraphError::node_not_found(edge.node_id)),
    };
    drop(rows);

    if !node_exists(conn, edge.target_id).await? {
        return Err(GraphError::node_not_found(edge.target_id));
    }

    match (policy, current) {
        (_, Some(existing)) if existing == edge.target_id.get() => return Ok(()),
        (LinkPolicy::RejectIfSet, Some(existing)) => {
            return Err(GraphError::LinkAlreadySet {
                node_id: edge.node_id,
                direction: edge.direction,
                existing: NodeId(existing),
            })
        }
        _ => {}
    }

    let update = format!("UPDATE nodes SET {} = ?1 WHERE id = ?2", column);
    conn.execute(&update, params![edge.target_id.get(), edge.node_id.get()])
        .await?;
    Ok(())
}

async fn node_exists(conn: &Connection, id: NodeId) -> Result<bool> {
    let mut rows = conn
        .query("SELECT 1 FROM nodes WHERE id = ?1", params![id.get()])
        .await?;
    Ok(rows.next().await?.is_some())
}
