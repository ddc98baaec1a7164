//! Repository port for worker persistence and conditional updates.

use crate::store::WriteOutcome;
use crate::worker::domain::{Worker, WorkerId, WorkerStatus};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for worker repository operations.
pub type WorkerRepositoryResult<T> = Result<T, WorkerRepositoryError>;

/// Worker persistence contract.
///
/// As with tasks, [`WorkerRepository::update_if_status`] must be atomic with
/// respect to concurrent writers of the same row.
#[async_trait]
pub trait WorkerRepository: Send + Sync {
    /// Stores a newly registered worker.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerRepositoryError::DuplicateWorker`] when the worker ID
    /// already exists.
    async fn store(&self, worker: &Worker) -> WorkerRepositoryResult<()>;

    /// Overwrites the stored row with `worker` only if the stored status
    /// still equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerRepositoryError::NotFound`] when the worker does not
    /// exist.
    async fn update_if_status(
        &self,
        worker: &Worker,
        expected: WorkerStatus,
    ) -> WorkerRepositoryResult<WriteOutcome>;

    /// Writes only the status, bound task, and update timestamp of `worker`
    /// if the stored status still equals `expected`.
    ///
    /// Heartbeat-owned columns keep their stored values.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerRepositoryError::NotFound`] when the worker does not
    /// exist.
    async fn update_assignment_if_status(
        &self,
        worker: &Worker,
        expected: WorkerStatus,
    ) -> WorkerRepositoryResult<WriteOutcome>;

    /// Finds a worker by identifier.
    async fn find_by_id(&self, id: WorkerId) -> WorkerRepositoryResult<Option<Worker>>;

    /// Returns every registered worker, ordered by registration time.
    async fn list_all(&self) -> WorkerRepositoryResult<Vec<Worker>>;

    /// Returns workers in the given status, ordered by registration time.
    async fn list_by_status(&self, status: WorkerStatus) -> WorkerRepositoryResult<Vec<Worker>>;

    /// Removes a worker registration.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerRepositoryError::NotFound`] when the worker does not
    /// exist.
    async fn delete(&self, id: WorkerId) -> WorkerRepositoryResult<()>;
}

/// Errors returned by worker repository implementations.
#[derive(Debug, Clone, Error)]
pub enum WorkerRepositoryError {
    /// A worker with the same identifier already exists.
    #[error("duplicate worker identifier: {0}")]
    DuplicateWorker(WorkerId),

    /// The worker was not found.
    #[error("worker not found: {0}")]
    NotFound(WorkerId),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl WorkerRepositoryError {
    /// Wraps a data-quality or deserialization error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
