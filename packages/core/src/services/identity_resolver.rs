//! Identity Resolver
//!
//! Maps a pose to its node id. The store's uniqueness constraint over
//! `(x, y, z, rx, ry, rz)` is what guarantees one row per pose; this module
//! only has to insert conflict-tolerantly and re-read after a conflict.

use crate::db::schema::pose_predicate;
use crate::db::{rollback_quietly, ConnectionPool};
use crate::models::{validate_joint_angles, JointAngles, NodeId, Pose};
use crate::services::error::{GraphError, Result};
use libsql::{params_from_iter, Connection, Value};
use std::sync::Arc;

const INSERT_OR_IGNORE_NODE: &str = "INSERT INTO nodes (x, y, z, rx, ry, rz, joint_angle)
     VALUES (?, ?, ?, ?, ?, ?, ?)
     ON CONFLICT (x, y, z, rx, ry, rz) DO NOTHING
     RETURNING id";

pub struct IdentityResolver {
    pool: Arc<ConnectionPool>,
}

impl IdentityResolver {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Look a node up by its pose
    ///
    /// Absence is `Ok(None)`, not an error. Any store failure during the
    /// lookup surfaces as `StoreUnavailable`.
    pub async fn find(&self, pose: &Pose) -> Result<Option<NodeId>> {
        let conn = self.pool.acquire().await?;
        find_on(&conn, pose).await.map_err(|e| match e {
            GraphError::Database(source) => {
                GraphError::store_unavailable(format!("lookup of pose {} failed: {}", pose, source))
            }
            other => other,
        })
    }

    /// Return the id of the node at `pose`, inserting it if it does not exist
    ///
    /// Runs as one write transaction. When a concurrent writer wins the insert
    /// race the conflict is absorbed by `ON CONFLICT DO NOTHING` and the id is
    /// re-read once. The result is the same whether the node was created by
    /// this call or already existed.
    ///
    /// # Errors
    ///
    /// - `InvalidJointAngle` if an angle is NaN or infinite (before any I/O)
    /// - `Serialization` if `joint_angle` cannot be encoded (before any I/O)
    /// - `StoreUnavailable` if no connection can be obtained, or if the
    ///   re-read after a conflict fails
    pub async fn create_or_get(&self, pose: &Pose, joint_angle: &JointAngles) -> Result<NodeId> {
        let joint_json = encode_joint_angles(joint_angle)?;

        let conn = self.pool.acquire().await?;
        let tx = conn.begin_immediate().await?;

        match insert_or_resolve(&tx, pose, joint_json).await {
            Ok(id) => {
                tx.commit().await?;
                Ok(id)
            }
            Err(e) => {
                rollback_quietly(tx).await;
                Err(e)
            }
        }
    }
}

/// JSON text stored in the `joint_angle` column
pub(crate) fn encode_joint_angles(joint_angle: &JointAngles) -> Result<String> {
    validate_joint_angles(joint_angle)?;
    Ok(serde_json::to_string(joint_angle)?)
}

pub(crate) async fn find_on(conn: &Connection, pose: &Pose) -> Result<Option<NodeId>> {
    let sql = format!("SELECT id FROM nodes WHERE {}", pose_predicate());
    let mut rows = conn.query(&sql, params_from_iter(pose.coordinates())).await?;

    match rows.next().await? {
        Some(row) => Ok(Some(NodeId(row.get(0)?))),
        None => Ok(None),
    }
}

async fn insert_or_resolve(conn: &Connection, pose: &Pose, joint_json: String) -> Result<NodeId> {
    let mut values: Vec<Value> = pose.coordinates().into_iter().map(Value::Real).collect();
    values.push(Value::Text(joint_json));

    let mut rows = conn.query(INSERT_OR_IGNORE_NODE, values).await?;
    if let Some(row) = rows.next().await? {
        let id = NodeId(row.get(0)?);
        tracing::debug!("Created node {} at {}", id, pose);
        return Ok(id);
    }
    drop(rows);

    tracing::debug!("Pose {} already stored, re-reading id", pose);
    match find_on(conn, pose).await {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Err(GraphError::store_unavailable(format!(
            "pose {} conflicted on insert but could not be re-read",
            pose
        ))),
        Err(e) => Err(GraphError::store_unavailable(format!(
            "re-read of pose {} after conflict failed: {}",
            pose, e
        ))),
    }
}
