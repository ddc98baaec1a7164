//! Heartbeat reconciliation with a bounded compare-and-swap retry loop.

use crate::config::HeartbeatConfig;
use crate::events::{EngineEvent, EventEmitter, EventType};
use crate::store::WriteOutcome;
use crate::worker::{
    domain::{HeartbeatReport, Worker, WorkerId},
    ports::{WorkerRepository, WorkerRepositoryError},
};
use mockable::Clock;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned while applying a heartbeat.
#[derive(Debug, Clone, Error)]
pub enum HeartbeatError {
    /// The reporting worker is not registered.
    #[error("worker not found: {0}")]
    NotFound(WorkerId),

    /// Every attempt lost its race against another writer.
    #[error("heartbeat for worker {worker_id} lost {attempts} consecutive races")]
    Conflict {
        /// Reporting worker.
        worker_id: WorkerId,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] WorkerRepositoryError),
}

impl HeartbeatError {
    /// Returns whether the heartbeat failed only because of concurrent
    /// writes, so the next heartbeat may simply try again.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type for heartbeat operations.
pub type HeartbeatResult<T> = Result<T, HeartbeatError>;

/// Applies worker self-reports against concurrently changing stored state.
#[derive(Clone)]
pub struct HeartbeatCoordinator<R, E, C>
where
    R: WorkerRepository,
    E: EventEmitter,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    emitter: Arc<E>,
    clock: Arc<C>,
    max_attempts: u32,
}

impl<R, E, C> HeartbeatCoordinator<R, E, C>
where
    R: WorkerRepository,
    E: EventEmitter,
    C: Clock + Send + Sync,
{
    /// Creates a coordinator with the default attempt bound.
    #[must_use]
    pub fn new(repository: Arc<R>, emitter: Arc<E>, clock: Arc<C>) -> Self {
        Self {
            repository,
            emitter,
            clock,
            max_attempts: HeartbeatConfig::default().max_attempts,
        }
    }

    /// Applies the configured attempt bound. Zero is raised to one.
    #[must_use]
    pub fn with_config(mut self, config: &HeartbeatConfig) -> Self {
        self.max_attempts = config.max_attempts.max(1);
        self
    }

    /// Returns the number of read-compute-write attempts per heartbeat.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Applies one heartbeat and returns the stored worker.
    ///
    /// Each attempt re-reads the worker, so the sticky `draining` and
    /// `offline` rules are evaluated against the latest stored status.
    ///
    /// # Errors
    ///
    /// Returns [`HeartbeatError::NotFound`] for unknown workers,
    /// [`HeartbeatError::Conflict`] once every attempt lost its race, and
    /// [`HeartbeatError::Repository`] when persistence fails.
    #[tracing::instrument(
        skip(self, report),
        fields(worker_id = %report.worker_id, reported = %report.status)
    )]
    pub async fn apply(&self, report: &HeartbeatReport) -> HeartbeatResult<Worker> {
        let worker_id = report.worker_id;
        for attempt in 1..=self.max_attempts {
            let mut worker = self
                .repository
                .find_by_id(worker_id)
                .await?
                .ok_or(HeartbeatError::NotFound(worker_id))?;
            let expected = worker.status();
            let resolved = worker.apply_heartbeat(report, &*self.clock);

            match self.repository.update_if_status(&worker, expected).await? {
                WriteOutcome::Applied => {
                    tracing::debug!(attempt, stored = %expected, %resolved, "heartbeat applied");
                    self.emit_heartbeat(&worker);
                    return Ok(worker);
                }
                WriteOutcome::Stale => {
                    tracing::debug!(attempt, stored = %expected, "heartbeat lost race, retrying");
                }
            }
        }

        tracing::warn!(attempts = self.max_attempts, "heartbeat gave up after repeated conflicts");
        Err(HeartbeatError::Conflict {
            worker_id,
            attempts: self.max_attempts,
        })
    }

    fn emit_heartbeat(&self, worker: &Worker) {
        let payload = json!({
            "worker_id": worker.id(),
            "status": worker.status(),
            "current_task_id": worker.current_task_id(),
            "telemetry": worker.telemetry(),
        });
        self.emitter.emit(EngineEvent::new(
            EventType::WorkerHeartbeat,
            payload,
            self.clock.utc(),
        ));
    }
}
