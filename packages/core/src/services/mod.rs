//! Business Services
//!
//! - [`IdentityResolver`] - pose to id, create-or-get under concurrency
//! - [`LinkManager`] - directional link updates, single and atomic bulk
//! - [`BulkWriter`] - chunked create-or-get for large node batches
//! - [`SpotGraph`] - access facade owning the pool, implementing [`GraphStore`]

pub mod bulk_writer;
pub mod error;
pub mod identity_resolver;
pub mod link_manager;
pub mod spot_graph;

pub use bulk_writer::BulkWriter;
pub use error::{GraphError, Result};
pub use identity_resolver::IdentityResolver;
pub use link_manager::LinkManager;
pub use spot_graph::{GraphStore, SpotGraph};
