//! Fault points for exercising partial-failure paths of the write layer.
//!
//! Each `SpotGraph` owns its own `FaultInjector`, so tests that arm faults do
//! not interfere with each other.
//!
//! A point is armed in one of two modes:
//!
//! - **fail**: the operation errors with `DatabaseError::FaultInjected`
//! - **park**: the operation suspends forever at the point, with its
//!   transaction still open, so the caller can drop it mid-write

use crate::db::error::DatabaseError;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::Notify;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// Inside a bulk node-insert chunk, after its rows are written, before COMMIT
    BulkInsertChunkBeforeCommit,
    /// Inside a bulk link transaction, before each edge is applied
    BulkLinkEdge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FaultMode {
    Fail,
    Park,
}

#[derive(Debug)]
struct FaultEntry {
    mode: FaultMode,
    skip: usize,
    remaining: usize,
}

#[derive(Debug, Default)]
pub struct FaultInjector {
    entries: Mutex<HashMap<FaultPoint, FaultEntry>>,
    parked: Notify,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `point` to fail `failures` times after letting `skip` passes through
    ///
    /// `configure(BulkInsertChunkBeforeCommit, 2, 1)` fails the third chunk.
    /// `failures == 0` disarms the point.
    pub fn configure(&self, point: FaultPoint, skip: usize, failures: usize) {
        self.arm(point, FaultMode::Fail, skip, failures);
    }

    /// Arm `point` to suspend once, after letting `skip` passes through
    ///
    /// The suspended operation never resumes; `wait_parked` returns once it
    /// has reached the point.
    pub fn park(&self, point: FaultPoint, skip: usize) {
        self.arm(point, FaultMode::Park, skip, 1);
    }

    /// Wait until an operation has parked at an armed point
    pub async fn wait_parked(&self) {
        self.parked.notified().await;
    }

    pub fn reset(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub(crate) async fn check(&self, point: FaultPoint) -> Result<(), DatabaseError> {
        match self.trip(point) {
            None => Ok(()),
            Some(FaultMode::Fail) => Err(DatabaseError::FaultInjected(format!("{point:?}"))),
            Some(FaultMode::Park) => {
                tracing::debug!("Parked at fault point {:?}", point);
                self.parked.notify_one();
                std::future::pending().await
            }
        }
    }

    fn arm(&self, point: FaultPoint, mode: FaultMode, skip: usize, failures: usize) {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if failures == 0 {
            guard.remove(&point);
        } else {
            guard.insert(
                point,
                FaultEntry {
                    mode,
                    skip,
                    remaining: failures,
                },
            );
        }
    }

    /// Count one pass through `point`, returning the mode if it fires
    fn trip(&self, point: FaultPoint) -> Option<FaultMode> {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = guard.get_mut(&point)?;

        if entry.skip > 0 {
            entry.skip -= 1;
            return None;
        }

        let mode = entry.mode;
        entry.remaining -= 1;
        if entry.remaining == 0 {
            guard.remove(&point);
        }
        Some(mode)
    }
}
