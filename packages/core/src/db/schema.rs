//! Schema for the `nodes` relation
//!
//! One table holds the whole lattice:
//!
//! - `id` - surrogate key (`AUTOINCREMENT`, ids are never reused)
//! - `x, y, z, rx, ry, rz` - pose identity, unique as a tuple
//! - `joint_angle` - opaque JSON text
//! - twelve nullable link columns referencing `nodes(id)`
//!
//! `create_tables` is idempotent (`CREATE TABLE IF NOT EXISTS`), so it runs on
//! every startup.

use crate::db::error::DatabaseError;
use crate::db::pool::execute_pragma;
use crate::models::{Direction, JointAngles, Links, NodeId, Pose, SpotNode};
use libsql::{Connection, Row};

/// Pose columns in identity order
pub const POSE_COLUMNS: [&str; 6] = ["x", "y", "z", "rx", "ry", "rz"];

/// Name of the uniqueness constraint over the pose columns
pub const POSE_CONSTRAINT: &str = "uq_nodes_position_rotation";

/// Column list for full-row reads, in the order `row_to_node` expects
pub(crate) fn node_columns() -> String {
    let mut columns = vec!["id"];
    columns.extend(POSE_COLUMNS);
    columns.push("joint_angle");
    columns.extend(Direction::ALL.iter().map(|d| d.column()));
    columns.join(", ")
}

/// `"x = ? AND y = ? AND ..."` for exact pose lookups
pub(crate) fn pose_predicate() -> String {
    POSE_COLUMNS
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn create_table_sql() -> String {
    let links = Direction::ALL
        .iter()
        .map(|d| format!("    {} INTEGER REFERENCES nodes(id)", d.column()))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "CREATE TABLE IF NOT EXISTS nodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    x REAL NOT NULL,
    y REAL NOT NULL,
    z REAL NOT NULL,
    rx REAL NOT NULL,
    ry REAL NOT NULL,
    rz REAL NOT NULL,
    joint_angle TEXT NOT NULL DEFAULT '{{}}',
{links},
    CONSTRAINT {POSE_CONSTRAINT} UNIQUE (x, y, z, rx, ry, rz)
)"
    )
}

/// Ensure the schema exists
///
/// Local stores are also switched to WAL mode so readers are not blocked by
/// the single writer.
pub async fn create_tables(conn: &Connection, is_local: bool) -> Result<(), DatabaseError> {
    if is_local {
        execute_pragma(conn, "PRAGMA journal_mode = WAL").await?;
    }

    conn.execute(&create_table_sql(), ())
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to create nodes table: {}", e)))?;

    tracing::debug!("Schema ensured for nodes table");
    Ok(())
}

/// Convert a row selected with `node_columns()` into a `SpotNode`
pub(crate) fn row_to_node(row: &Row) -> Result<SpotNode, DatabaseError> {
    let id: i64 = row.get(0)?;

    let mut coordinates = [0.0; 6];
    for (i, c) in coordinates.iter_mut().enumerate() {
        *c = row.get::<f64>(i as i32 + 1)?;
    }
    let pose = Pose::from_coordinates(coordinates).map_err(|e| {
        DatabaseError::sql_execution(format!("Node {} has an unreadable pose: {}", id, e))
    })?;

    let joint_json: String = row.get(7)?;
    let joint_angle: JointAngles = serde_json::from_str(&joint_json).map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to parse joint_angle of node {}: {}", id, e))
    })?;

    Ok(SpotNode {
        id: Some(NodeId(id)),
        pose,
        joint_angle,
        links: row_to_links(row, 8)?,
    })
}

/// Read the twelve link columns starting at `offset`
pub(crate) fn row_to_links(row: &Row, offset: i32) -> Result<Links, DatabaseError> {
    let mut links = Links::default();
    for (i, direction) in Direction::ALL.iter().enumerate() {
        let target: Option<i64> = row.get(offset + i as i32)?;
        links.set(*direction, target.map(NodeId));
    }
    Ok(links)
}
