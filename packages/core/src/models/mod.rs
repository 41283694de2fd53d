//! Data Models
//!
//! This module contains the in-memory data structures of the pose lattice:
//!
//! - `SpotNode` - A pose plus joint configuration and twelve neighbor links
//! - `Pose` / `PoseKey` - The six-tuple identity of a node
//! - `Direction` / `Links` / `LinkEdge` - The directional adjacency model
//!
//! Nothing in this module performs I/O.

mod direction;
mod node;

pub use direction::{Direction, LinkEdge, Links};
pub use node::{
    validate_joint_angles, JointAngles, NodeId, Pose, PoseKey, SpotNode, ValidationError,
};
