//! Errors surfaced by the executor API.

use crate::checkpoint::SnapshotViolation;
use crate::engine::Status;
use thiserror::Error;

/// Failures that abort an executor call.
///
/// Callback failures are not part of this type: they are reported to the
/// listener sink and execution carries on.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("Cannot {operation} while the machine is {status}")]
    IllegalStart {
        operation: &'static str,
        status: Status,
    },

    #[error("Region '{name}' ({region}) has no initial pseudostate and no explicit target")]
    DefaultEntry {
        region: crate::core::RegionId,
        name: String,
    },

    #[error("No outgoing transition of '{name}' ({vertex}) is enabled")]
    DeadEnd {
        vertex: crate::core::VertexId,
        name: String,
    },

    #[error("Machine '{machine}' has activities or time events and needs a worker pool")]
    RequiresWorkerPool { machine: String },

    #[error("No worker pool configured and no tokio runtime is running")]
    NoWorkerPool,

    #[error("Snapshot rejected with {} violation(s)", .violations.len())]
    InvalidSnapshot { violations: Vec<SnapshotViolation> },

    #[error("Executor task has shut down")]
    ExecutorClosed,
}

impl EngineError {
    pub(crate) fn illegal(operation: &'static str, status: Status) -> Self {
        EngineError::IllegalStart { operation, status }
    }
}
