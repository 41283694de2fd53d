//! Service Layer Error Types
//!
//! `GraphError` is the only error type returned by graph operations. Each
//! variant carries enough context (failing index, committed count) for the
//! caller to retry safely.

use crate::db::DatabaseError;
use crate::models::{Direction, NodeId, ValidationError};
use thiserror::Error;

/// Graph operation errors
#[derive(Error, Debug)]
pub enum GraphError {
    /// Position or rotation is not a 3-vector of finite numbers (no I/O was attempted)
    #[error("Invalid pose shape: {field}: {detail}")]
    InvalidPoseShape { field: &'static str, detail: String },

    /// Store could not be reached, or the pool stayed exhausted past its wait
    #[error("Store unavailable: {context}")]
    StoreUnavailable { context: String },

    /// A joint angle is NaN or infinite (no I/O was attempted)
    #[error("Invalid joint angle: '{joint}' must be finite, got {value}")]
    InvalidJointAngle { joint: String, value: f64 },

    /// A referenced node id does not exist
    #[error("Node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// Direction token is not one of the twelve lattice directions
    #[error("Unknown direction: '{token}'")]
    UnknownDirection { token: String },

    /// Link field already references another node and the policy forbids overwriting
    #[error("Link {direction} of node {node_id} is already set to {existing}")]
    LinkAlreadySet {
        node_id: NodeId,
        direction: Direction,
        existing: NodeId,
    },

    /// A bulk link batch was rolled back because the edge at `index` failed
    #[error("Bulk link update failed at edge {index}: {source}")]
    BulkLinkFailure {
        index: usize,
        #[source]
        source: Box<GraphError>,
    },

    /// A chunked bulk insert stopped part-way; earlier chunks stay committed
    #[error(
        "Bulk insert failed at chunk {first_failed_chunk} after committing {committed_count} rows: {source}"
    )]
    PartialBulkFailure {
        committed_count: usize,
        first_failed_chunk: usize,
        committed_ids: Vec<NodeId>,
        #[source]
        source: Box<GraphError>,
    },

    /// Joint angles could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration rejected before connecting
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Store-level failure other than unavailability
    #[error("Database operation failed: {0}")]
    Database(#[source] DatabaseError),
}

impl GraphError {
    pub fn node_not_found(id: NodeId) -> Self {
        Self::NodeNotFound { id }
    }

    pub fn store_unavailable(context: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            context: context.into(),
        }
    }

    /// Whether retrying the same call later might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StoreUnavailable { .. } | Self::PartialBulkFailure { .. } => true,
            Self::BulkLinkFailure { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

impl From<DatabaseError> for GraphError {
    fn from(err: DatabaseError) -> Self {
        if err.is_unavailable() {
            Self::StoreUnavailable {
                context: err.to_string(),
            }
        } else {
            Self::Database(err)
        }
    }
}

impl From<libsql::Error> for GraphError {
    fn from(err: libsql::Error) -> Self {
        Self::Database(DatabaseError::LibsqlError(err))
    }
}

impl From<ValidationError> for GraphError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidPoseShape { field, detail } => {
                Self::InvalidPoseShape { field, detail }
            }
            ValidationError::UnknownDirection { token } => Self::UnknownDirection { token },
            ValidationError::NonFiniteJointAngle { joint, value } => {
                Self::InvalidJointAngle { joint, value }
            }
        }
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
