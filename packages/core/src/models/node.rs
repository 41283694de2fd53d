//! Pose Node Data Structures
//!
//! This module defines the `SpotNode` struct and the pose identity types used
//! by every layer of the graph store.
//!
//! # Identity
//!
//! A node is identified by its six-tuple pose `(x, y, z, rx, ry, rz)`, not by
//! its surrogate id. The surrogate `NodeId` is assigned by the store on insert
//! and only used as the target of directional links.
//!
//! # Examples
//!
//! ```rust
//! use spotgraph_core::models::SpotNode;
//!
//! let node = SpotNode::new(&[0.0, 0.0, 0.2], &[0.0, 0.0, 0.0], None).unwrap();
//! assert!(node.id.is_none());
//! assert!(node.links.is_empty());
//! ```

use crate::models::direction::Links;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Joint name to angle mapping, stored as an opaque JSON value
pub type JointAngles = BTreeMap<String, f64>;

/// Check that every joint angle survives a JSON round trip
///
/// JSON has no NaN or infinity; such values would be written as `null` and
/// the stored node could never be read back.
pub fn validate_joint_angles(joint_angle: &JointAngles) -> Result<(), ValidationError> {
    match joint_angle.iter().find(|(_, value)| !value.is_finite()) {
        Some((joint, value)) => Err(ValidationError::NonFiniteJointAngle {
            joint: joint.clone(),
            value: *value,
        }),
        None => Ok(()),
    }
}

/// Validation errors raised before any store I/O
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid pose shape: {field} must have exactly 3 finite components, got {detail}")]
    InvalidPoseShape { field: &'static str, detail: String },

    #[error("Unknown direction: '{token}'")]
    UnknownDirection { token: String },

    #[error("Invalid joint angle: '{joint}' must be finite, got {value}")]
    NonFiniteJointAngle { joint: String, value: f64 },
}

/// Store-assigned surrogate id of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl NodeId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for NodeId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hashable identity key for a pose (bit patterns of the normalized coordinates)
///
/// Two poses have equal keys exactly when the store's uniqueness constraint
/// treats them as the same row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoseKey([u64; 6]);

/// Six-degree-of-freedom pose: base position and base rotation
///
/// Deserialization goes through `Pose::new`, so decoded poses are validated
/// and normalized like constructed ones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPose")]
pub struct Pose {
    pub position: [f64; 3],
    pub rotation: [f64; 3],
}

/// Wire form of `Pose` before validation
#[derive(Deserialize)]
struct RawPose {
    position: [f64; 3],
    rotation: [f64; 3],
}

impl TryFrom<RawPose> for Pose {
    type Error = ValidationError;

    fn try_from(raw: RawPose) -> Result<Self, Self::Error> {
        Pose::new(raw.position, raw.rotation)
    }
}

impl Pose {
    /// Build a pose from fixed-size vectors
    ///
    /// Fails with `InvalidPoseShape` if any component is NaN or infinite.
    /// Negative zero is normalized to zero.
    pub fn new(position: [f64; 3], rotation: [f64; 3]) -> Result<Self, ValidationError> {
        Ok(Self {
            position: normalize("position", position)?,
            rotation: normalize("rotation", rotation)?,
        })
    }

    /// Build a pose from slices, checking that each has exactly 3 components
    pub fn from_slices(position: &[f64], rotation: &[f64]) -> Result<Self, ValidationError> {
        Self::new(
            to_vector("position", position)?,
            to_vector("rotation", rotation)?,
        )
    }

    /// The identity tuple in column order `(x, y, z, rx, ry, rz)`
    pub fn coordinates(&self) -> [f64; 6] {
        let [x, y, z] = self.position;
        let [rx, ry, rz] = self.rotation;
        [x, y, z, rx, ry, rz]
    }

    pub fn key(&self) -> PoseKey {
        PoseKey(self.coordinates().map(f64::to_bits))
    }

    /// Rebuild a pose from values read back from the store
    pub(crate) fn from_coordinates(c: [f64; 6]) -> Result<Self, ValidationError> {
        Self::new([c[0], c[1], c[2]], [c[3], c[4], c[5]])
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z, rx, ry, rz] = self.coordinates();
        write!(f, "({x}, {y}, {z}, {rx}, {ry}, {rz})")
    }
}

fn to_vector(field: &'static str, values: &[f64]) -> Result<[f64; 3], ValidationError> {
    values
        .try_into()
        .map_err(|_| ValidationError::InvalidPoseShape {
            field,
            detail: format!("{} components", values.len()),
        })
}

fn normalize(field: &'static str, mut v: [f64; 3]) -> Result<[f64; 3], ValidationError> {
    for c in v.iter_mut() {
        if !c.is_finite() {
            return Err(ValidationError::InvalidPoseShape {
                field,
                detail: format!("non-finite component {c}"),
            });
        }
        // -0.0 + 0.0 == +0.0
        *c += 0.0;
    }
    Ok(v)
}

/// A pose-lattice node
///
/// # Fields
///
/// - `id`: Surrogate id, `None` until the node has been written to the store
/// - `pose`: Identity tuple
/// - `joint_angle`: Joint configuration at this pose (opaque to the store)
/// - `links`: Twelve directional neighbor references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotNode {
    pub id: Option<NodeId>,
    pub pose: Pose,
    #[serde(default)]
    pub joint_angle: JointAngles,
    #[serde(default)]
    pub links: Links,
}

impl SpotNode {
    /// Create an unsaved node with no id and all links unset
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidPoseShape` if `position` or `rotation`
    /// does not have exactly 3 finite components, and
    /// `ValidationError::NonFiniteJointAngle` if any joint angle is NaN or infinite.
    pub fn new(
        position: &[f64],
        rotation: &[f64],
        joint_angle: Option<JointAngles>,
    ) -> Result<Self, ValidationError> {
        let pose = Pose::from_slices(position, rotation)?;
        let joint_angle = joint_angle.unwrap_or_default();
        validate_joint_angles(&joint_angle)?;
        Ok(Self::from_pose(pose, joint_angle))
    }

    /// Assemble a node without checking `joint_angle`; writes still reject
    /// non-finite angles
    pub fn from_pose(pose: Pose, joint_angle: JointAngles) -> Self {
        Self {
            id: None,
            pose,
            joint_angle,
            links: Links::default(),
        }
    }
}
