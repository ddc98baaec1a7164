//! Error types for worker domain validation and parsing.

use super::{WorkerId, WorkerStatus};
use thiserror::Error;

/// Errors returned while constructing or transitioning workers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkerDomainError {
    /// The worker name is empty after trimming.
    #[error("worker name must not be empty")]
    EmptyWorkerName,

    /// The worker must be able to run at least one task at a time.
    #[error("worker concurrency budget must be at least 1")]
    ZeroConcurrency,

    /// The requested status change is not permitted from the current status.
    #[error("worker {worker_id} cannot {operation} while {from}")]
    InvalidStatusChange {
        /// Worker identifier.
        worker_id: WorkerId,
        /// Current status.
        from: WorkerStatus,
        /// Operation that was attempted.
        operation: &'static str,
    },
}

/// Error returned while parsing worker statuses from persistence or reports.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown worker status: {0}")]
pub struct ParseWorkerStatusError(pub String);
