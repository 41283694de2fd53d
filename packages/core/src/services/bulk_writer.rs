//! Bulk Writer
//!
//! Inserts many nodes with as few statements as possible while keeping the
//! same create-or-get semantics as `IdentityResolver::create_or_get`.
//!
//! # Chunking
//!
//! Input rows are split into chunks of `chunk_size`. Each chunk is one
//! transaction made of two statements:
//!
//! 1. a multi-row `INSERT ... ON CONFLICT DO NOTHING RETURNING` for every
//!    distinct pose in the chunk
//! 2. a single `SELECT ... WHERE (x, y, z, rx, ry, rz) IN (VALUES ...)` for
//!    the poses that were already stored
//!
//! Chunks commit independently. If chunk `k` fails, chunks `0..k` stay
//! committed and the caller receives `PartialBulkFailure`. Re-running the
//! whole input afterwards is safe: stored poses resolve to their existing ids.

use crate::db::{rollback_quietly, ConnectionPool, FaultInjector, FaultPoint};
use crate::models::{NodeId, Pose, PoseKey, SpotNode};
use crate::services::error::{GraphError, Result};
use crate::services::identity_resolver::encode_joint_angles;
use libsql::{Connection, Row, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A node row ready to be written: pose plus serialized joint angles
type PendingRow = (Pose, String);

pub struct BulkWriter {
    pool: Arc<ConnectionPool>,
    chunk_size: usize,
    faults: Arc<FaultInjector>,
}

impl BulkWriter {
    pub fn new(pool: Arc<ConnectionPool>, chunk_size: usize, faults: Arc<FaultInjector>) -> Self {
        Self {
            pool,
            chunk_size: chunk_size.max(1),
            faults,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Create-or-get every node, returning ids in input order
    ///
    /// Duplicate poses, within the batch or already in the store, map to the
    /// same id; the joint angles of the first occurrence are the ones stored.
    ///
    /// # Errors
    ///
    /// - `InvalidJointAngle` or `Serialization` if any joint angle map cannot be
    ///   encoded (before any I/O)
    /// - `PartialBulkFailure` if a chunk fails; `committed_ids` holds the ids
    ///   of all rows in the chunks that did commit
    pub async fn add_nodes_bulk(&self, nodes: &[SpotNode]) -> Result<Vec<NodeId>> {
        let rows = nodes
            .iter()
            .map(|node| Ok((node.pose, encode_joint_angles(&node.joint_angle)?)))
            .collect::<Result<Vec<PendingRow>>>()?;

        let chunk_count = rows.len().div_ceil(self.chunk_size);
        let mut ids = Vec::with_capacity(rows.len());

        for (chunk_index, chunk) in rows.chunks(self.chunk_size).enumerate() {
            match self.write_chunk(chunk).await {
                Ok(chunk_ids) => {
                    ids.extend(chunk_ids);
                    tracing::debug!(
                        "Inserting nodes: chunk {}/{} committed ({} rows)",
                        chunk_index + 1,
                        chunk_count,
                        ids.len()
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Bulk insert stopped at chunk {}/{} with {} rows committed: {}",
                        chunk_index + 1,
                        chunk_count,
                        ids.len(),
                        e
                    );
                    return Err(GraphError::PartialBulkFailure {
                        committed_count: ids.len(),
                        first_failed_chunk: chunk_index,
                        committed_ids: ids,
                        source: Box::new(e),
                    });
                }
            }
        }

        tracing::info!(
            "Bulk insert resolved {} rows in {} chunks",
            ids.len(),
            chunk_count
        );
        Ok(ids)
    }

    /// One chunk, one transaction
    async fn write_chunk(&self, chunk: &[PendingRow]) -> Result<Vec<NodeId>> {
        // Collapse duplicates so each pose is written once; first occurrence wins
        let mut slots: HashMap<PoseKey, usize> = HashMap::with_capacity(chunk.len());
        let mut distinct: Vec<&PendingRow> = Vec::with_capacity(chunk.len());
        let positions: Vec<usize> = chunk
            .iter()
            .map(|row| {
                *slots.entry(row.0.key()).or_insert_with(|| {
                    distinct.push(row);
                    distinct.len() - 1
                })
            })
            .collect();

        let conn = self.pool.acquire().await?;
        let tx = conn.begin_immediate().await?;

        let resolved = match self.resolve_distinct(&tx, &distinct).await {
            Ok(resolved) => resolved,
            Err(e) => {
                rollback_quietly(tx).await;
                return Err(e);
            }
        };
        tx.commit().await?;

        Ok(positions.into_iter().map(|slot| resolved[slot]).collect())
    }

    /// Insert-or-find each distinct row, returning ids aligned with `distinct`
    async fn resolve_distinct(
        &self,
        conn: &Connection,
        distinct: &[&PendingRow],
    ) -> Result<Vec<NodeId>> {
        let mut by_key: HashMap<PoseKey, NodeId> = HashMap::with_capacity(distinct.len());

        let insert = format!(
            "INSERT INTO nodes (x, y, z, rx, ry, rz, joint_angle) VALUES {}
             ON CONFLICT (x, y, z, rx, ry, rz) DO NOTHING
             RETURNING id, x, y, z, rx, ry, rz",
            placeholders(distinct.len(), 7)
        );
        let mut values = Vec::with_capacity(distinct.len() * 7);
        for (pose, joint_json) in distinct {
            values.extend(pose.coordinates().map(Value::Real));
            values.push(Value::Text(joint_json.clone()));
        }

        let mut rows = conn.query(&insert, values).await?;
        while let Some(row) = rows.next().await? {
            let (key, id) = read_key_and_id(&row)?;
            by_key.insert(key, id);
        }
        drop(rows);
        let inserted = by_key.len();

        let existing: Vec<&Pose> = distinct
            .iter()
            .map(|(pose, _)| pose)
            .filter(|pose| !by_key.contains_key(&pose.key()))
            .collect();

        if !existing.is_empty() {
            let select = format!(
                "SELECT id, x, y, z, rx, ry, rz FROM nodes
                 WHERE (x, y, z, rx, ry, rz) IN (VALUES {})",
                placeholders(existing.len(), 6)
            );
            let values: Vec<Value> = existing
                .iter()
                .flat_map(|pose| pose.coordinates().map(Value::Real))
                .collect();

            let mut rows = conn.query(&select, values).await?;
            while let Some(row) = rows.next().await? {
                let (key, id) = read_key_and_id(&row)?;
                by_key.insert(key, id);
            }
        }

        tracing::trace!(
            "Chunk of {} distinct poses: {} inserted, {} already stored",
            distinct.len(),
            inserted,
            existing.len()
        );

        self.faults
            .check(FaultPoint::BulkInsertChunkBeforeCommit)
            .await?;

        distinct
            .iter()
            .map(|(pose, _)| {
                by_key.get(&pose.key()).copied().ok_or_else(|| {
                    GraphError::store_unavailable(format!(
                        "pose {} was neither inserted nor found",
                        pose
                    ))
                })
            })
            .collect()
    }
}

/// `"(?, ?), (?, ?)"` for `rows` tuples of `width` parameters
fn placeholders(rows: usize, width: usize) -> String {
    let tuple = format!("({})", vec!["?"; width].join(", "));
    vec![tuple.as_str(); rows].join(", ")
}

/// Read `id, x, y, z, rx, ry, rz` back into a pose key
fn read_key_and_id(row: &Row) -> Result<(PoseKey, NodeId)> {
    let id = NodeId(row.get(0)?);
    let mut coordinates = [0.0; 6];
    for (i, c) in coordinates.iter_mut().enumerate() {
        *c = row.get::<f64>(i as i32 + 1)?;
    }
    let pose = Pose::from_coordinates(coordinates)?;
    Ok((pose.key(), id))
}
