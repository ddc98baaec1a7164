//! Worker registration and administrative status changes.

use crate::config::SchedulerConfig;
use crate::events::{EngineEvent, EventEmitter, EventType};
use crate::store::WriteOutcome;
use crate::task::domain::AgentId;
use crate::worker::{
    domain::{Worker, WorkerCapabilities, WorkerDomainError, WorkerId, WorkerMode, WorkerStatus},
    ports::{WorkerRepository, WorkerRepositoryError},
};
use mockable::Clock;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Request payload for registering a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterWorkerRequest {
    name: String,
    mode: WorkerMode,
    agents: Vec<AgentId>,
    environment: Vec<String>,
    max_concurrent_tasks: Option<u32>,
}

impl RegisterWorkerRequest {
    /// Creates a request for a worker with no declared agents.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: WorkerMode::Unknown,
            agents: Vec::new(),
            environment: Vec::new(),
            max_concurrent_tasks: None,
        }
    }

    /// Sets the run mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: WorkerMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the agent CLIs the worker can run.
    #[must_use]
    pub fn with_agents(mut self, agents: impl IntoIterator<Item = AgentId>) -> Self {
        self.agents = agents.into_iter().collect();
        self
    }

    /// Sets the reported environment variable names.
    #[must_use]
    pub fn with_environment(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.environment = names.into_iter().collect();
        self
    }

    /// Overrides the engine-wide concurrency budget for this worker.
    #[must_use]
    pub const fn with_max_concurrent_tasks(mut self, limit: u32) -> Self {
        self.max_concurrent_tasks = Some(limit);
        self
    }
}

/// Service-level errors for worker administration.
#[derive(Debug, Clone, Error)]
pub enum WorkerAdminError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] WorkerDomainError),

    /// The worker does not exist.
    #[error("worker not found: {0}")]
    NotFound(WorkerId),

    /// The worker changed between read and write.
    #[error("worker {worker_id} is no longer {expected}")]
    Conflict {
        /// Worker identifier.
        worker_id: WorkerId,
        /// Status observed before the write.
        expected: WorkerStatus,
    },

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] WorkerRepositoryError),
}

impl WorkerAdminError {
    /// Returns whether the change lost a race against another writer.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type for worker administration.
pub type WorkerAdminResult<T> = Result<T, WorkerAdminError>;

/// Operator-facing worker management.
///
/// Status changes are single compare-and-swap writes that fail fast on
/// conflict; only heartbeats retry.
#[derive(Clone)]
pub struct WorkerAdminService<R, E, C>
where
    R: WorkerRepository,
    E: EventEmitter,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    emitter: Arc<E>,
    clock: Arc<C>,
    default_max_concurrent_tasks: u32,
}

impl<R, E, C> WorkerAdminService<R, E, C>
where
    R: WorkerRepository,
    E: EventEmitter,
    C: Clock + Send + Sync,
{
    /// Creates a new administration service.
    #[must_use]
    pub fn new(repository: Arc<R>, emitter: Arc<E>, clock: Arc<C>) -> Self {
        Self {
            repository,
            emitter,
            clock,
            default_max_concurrent_tasks: SchedulerConfig::default().default_max_concurrent_tasks,
        }
    }

    /// Applies the configured default concurrency budget.
    #[must_use]
    pub const fn with_config(mut self, config: &SchedulerConfig) -> Self {
        self.default_max_concurrent_tasks = config.default_max_concurrent_tasks;
        self
    }

    /// Registers a new idle worker.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerAdminError::Domain`] for invalid input and
    /// [`WorkerAdminError::Repository`] when persistence fails.
    #[tracing::instrument(skip(self, request), fields(name = %request.name))]
    pub async fn register(&self, request: RegisterWorkerRequest) -> WorkerAdminResult<Worker> {
        let RegisterWorkerRequest {
            name,
            mode,
            agents,
            environment,
            max_concurrent_tasks,
        } = request;

        let capabilities = WorkerCapabilities::new(
            max_concurrent_tasks.unwrap_or(self.default_max_concurrent_tasks),
        )
        .with_agents(agents)
        .with_environment(environment);
        let worker = Worker::new(name, mode, capabilities, &*self.clock)?;
        self.repository.store(&worker).await?;

        tracing::info!(worker_id = %worker.id(), "worker registered");
        self.emit(
            EventType::WorkerRegistered,
            json!({
                "worker_id": worker.id(),
                "name": worker.name(),
                "mode": worker.mode(),
                "capabilities": worker.capabilities(),
            }),
        );
        Ok(worker)
    }

    /// Finds a worker by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerAdminError::Repository`] when persistence fails.
    pub async fn find(&self, worker_id: WorkerId) -> WorkerAdminResult<Option<Worker>> {
        Ok(self.repository.find_by_id(worker_id).await?)
    }

    /// Returns every registered worker.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerAdminError::Repository`] when persistence fails.
    pub async fn list(&self) -> WorkerAdminResult<Vec<Worker>> {
        Ok(self.repository.list_all().await?)
    }

    /// Returns an offline or draining worker to service as `idle`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerAdminError::Domain`] when the worker is not offline or
    /// draining and [`WorkerAdminError::Conflict`] when it changed
    /// concurrently.
    #[tracing::instrument(skip(self))]
    pub async fn activate(&self, worker_id: WorkerId) -> WorkerAdminResult<Worker> {
        self.change_status(worker_id, |worker, clock| worker.activate(clock))
            .await
    }

    /// Marks an idle or busy worker as draining.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerAdminError::Domain`] when the worker is neither idle
    /// nor busy and [`WorkerAdminError::Conflict`] when it changed
    /// concurrently.
    #[tracing::instrument(skip(self))]
    pub async fn drain(&self, worker_id: WorkerId) -> WorkerAdminResult<Worker> {
        self.change_status(worker_id, |worker, clock| worker.drain(clock))
            .await
    }

    /// Takes a worker offline.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerAdminError::Domain`] when the worker is already
    /// offline and [`WorkerAdminError::Conflict`] when it changed
    /// concurrently.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate(&self, worker_id: WorkerId) -> WorkerAdminResult<Worker> {
        self.change_status(worker_id, |worker, clock| worker.deactivate(clock))
            .await
    }

    async fn change_status<F>(&self, worker_id: WorkerId, change: F) -> WorkerAdminResult<Worker>
    where
        F: FnOnce(&mut Worker, &C) -> Result<(), WorkerDomainError> + Send,
    {
        let mut worker = self
            .repository
            .find_by_id(worker_id)
            .await?
            .ok_or(WorkerAdminError::NotFound(worker_id))?;
        let expected = worker.status();
        change(&mut worker, &*self.clock)?;

        if self.repository.update_if_status(&worker, expected).await? == WriteOutcome::Stale {
            tracing::warn!(%expected, "worker changed before the status write");
            return Err(WorkerAdminError::Conflict {
                worker_id,
                expected,
            });
        }

        tracing::info!(from = %expected, to = %worker.status(), "worker status changed");
        self.emit(
            EventType::WorkerStatusChanged,
            json!({
                "worker_id": worker.id(),
                "from": expected,
                "to": worker.status(),
            }),
        );
        Ok(worker)
    }

    fn emit(&self, event_type: EventType, payload: serde_json::Value) {
        self.emitter
            .emit(EngineEvent::new(event_type, payload, self.clock.utc()));
    }
}
