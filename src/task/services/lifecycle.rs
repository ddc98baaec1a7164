//! Service layer for task creation, replay, and execution reports.

use crate::config::RetryConfig;
use crate::events::{EngineEvent, EventEmitter, EventType};
use crate::store::WriteOutcome;
use crate::task::{
    domain::{
        AgentId, GroupId, Task, TaskDomainError, TaskDraft, TaskId, TaskSource, TaskStatus,
        VcsFields,
    },
    ports::{TaskRepository, TaskRepositoryError, VcsClient, VcsClientError},
};
use crate::worker::domain::WorkerId;
use mockable::Clock;
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;

/// Request payload for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskRequest {
    title: String,
    prompt: String,
    agent: String,
    group_id: Option<GroupId>,
    depends_on: Vec<TaskId>,
    max_retries: Option<u32>,
    source: TaskSource,
    requires_review: bool,
    vcs: VcsFields,
}

impl NewTaskRequest {
    /// Creates a request for an ungrouped, scheduler-driven task that needs
    /// review.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        prompt: impl Into<String>,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            prompt: prompt.into(),
            agent: agent.into(),
            group_id: None,
            depends_on: Vec::new(),
            max_retries: None,
            source: TaskSource::Scheduler,
            requires_review: true,
            vcs: VcsFields::default(),
        }
    }

    /// Places the task in a pipeline group.
    #[must_use]
    pub const fn with_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    /// Sets the prerequisite tasks.
    #[must_use]
    pub fn with_dependencies(mut self, depends_on: impl IntoIterator<Item = TaskId>) -> Self {
        self.depends_on = depends_on.into_iter().collect();
        self
    }

    /// Overrides the engine-wide retry ceiling.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the task source.
    #[must_use]
    pub const fn with_source(mut self, source: TaskSource) -> Self {
        self.source = source;
        self
    }

    /// Sets whether finished work waits for a human review.
    #[must_use]
    pub const fn with_requires_review(mut self, requires_review: bool) -> Self {
        self.requires_review = requires_review;
        self
    }

    /// Sets repository and branch coordinates.
    #[must_use]
    pub fn with_vcs(mut self, vcs: VcsFields) -> Self {
        self.vcs = vcs;
        self
    }
}

/// Service-level errors for task lifecycle operations.
#[derive(Debug, Clone, Error)]
pub enum TaskLifecycleError {
    /// A precondition failed before any write.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),

    /// The task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The task is queued or running, so replaying it could run it twice.
    #[error("task {task_id} is {status}; wait for it to finish before replaying it")]
    TaskActive {
        /// Task identifier.
        task_id: TaskId,
        /// Current status.
        status: TaskStatus,
    },

    /// The task changed between read and write.
    #[error("task {task_id} is no longer {expected}")]
    Conflict {
        /// Task identifier.
        task_id: TaskId,
        /// Status observed before the write.
        expected: TaskStatus,
    },

    /// A restart would reset tasks that are executing right now.
    #[error("group {group_id} has running tasks in the restart closure: {task_ids:?}")]
    RunningInClosure {
        /// Group being restarted.
        group_id: GroupId,
        /// Running tasks inside the closure.
        task_ids: Vec<TaskId>,
    },

    /// The restart origin is not a scheduler task of the group.
    #[error("task {task_id} is not a scheduler task in group {group_id}")]
    TaskNotInGroup {
        /// Group being restarted.
        group_id: GroupId,
        /// Requested origin.
        task_id: TaskId,
    },

    /// The VCS provider failed.
    #[error(transparent)]
    Vcs(#[from] VcsClientError),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
}

impl TaskLifecycleError {
    /// Returns whether the operation lost a race or would race with an
    /// execution in flight; callers should re-fetch and decide again.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::TaskActive { .. })
    }
}

/// Result type for task lifecycle service operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;

/// Task lifecycle orchestration service.
///
/// Every mutation reads the task, computes the next state in the domain,
/// and writes it back only if the stored status is unchanged.
#[derive(Clone)]
pub struct TaskLifecycleService<R, V, E, C>
where
    R: TaskRepository,
    V: VcsClient,
    E: EventEmitter,
    C: Clock + Send + Sync,
{
    pub(super) repository: Arc<R>,
    pub(super) vcs: Arc<V>,
    pub(super) emitter: Arc<E>,
    pub(super) clock: Arc<C>,
    default_max_retries: u32,
}

impl<R, V, E, C> TaskLifecycleService<R, V, E, C>
where
    R: TaskRepository,
    V: VcsClient,
    E: EventEmitter,
    C: Clock + Send + Sync,
{
    /// Creates a new task lifecycle service.
    #[must_use]
    pub fn new(repository: Arc<R>, vcs: Arc<V>, emitter: Arc<E>, clock: Arc<C>) -> Self {
        Self {
            repository,
            vcs,
            emitter,
            clock,
            default_max_retries: RetryConfig::default().default_max_retries,
        }
    }

    /// Applies the configured default retry ceiling.
    #[must_use]
    pub const fn with_config(mut self, config: &RetryConfig) -> Self {
        self.default_max_retries = config.default_max_retries;
        self
    }

    /// Creates a task in `waiting`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] for invalid input, unknown
    /// dependencies, or dependencies outside the task's group, and
    /// [`TaskLifecycleError::Repository`] when persistence fails.
    #[tracing::instrument(skip(self, request), fields(title = %request.title))]
    pub async fn create(&self, request: NewTaskRequest) -> TaskLifecycleResult<Task> {
        let NewTaskRequest {
            title,
            prompt,
            agent,
            group_id,
            depends_on,
            max_retries,
            source,
            requires_review,
            vcs,
        } = request;

        let agent_id = AgentId::new(agent)?;
        for dependency in &depends_on {
            let found = self
                .repository
                .find_by_id(*dependency)
                .await?
                .ok_or(TaskDomainError::UnknownDependency(*dependency))?;
            if found.group_id() != group_id {
                return Err(TaskDomainError::DependencyOutsideGroup {
                    group_id,
                    dependency: *dependency,
                }
                .into());
            }
        }

        let draft = TaskDraft {
            title,
            prompt,
            agent: agent_id,
            group_id,
            depends_on,
            max_retries: max_retries.unwrap_or(self.default_max_retries),
            source,
            requires_review,
            vcs,
        };
        let task = Task::new(draft, &*self.clock)?;
        self.repository.store(&task).await?;

        tracing::info!(task_id = %task.id(), "task created");
        self.emit(
            EventType::TaskCreated,
            json!({
                "task_id": task.id(),
                "group_id": task.group_id(),
                "agent": task.agent(),
                "depends_on": task.depends_on(),
                "source": task.source(),
            }),
        );
        Ok(task)
    }

    /// Finds a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when persistence fails.
    pub async fn find(&self, task_id: TaskId) -> TaskLifecycleResult<Option<Task>> {
        Ok(self.repository.find_by_id(task_id).await?)
    }

    /// Returns every task in a group, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when persistence fails.
    pub async fn list_group(&self, group_id: GroupId) -> TaskLifecycleResult<Vec<Task>> {
        Ok(self.repository.list_by_group(group_id).await?)
    }

    /// Replays one finished task.
    ///
    /// The task lands in `queued` with a fresh retry window. New feedback
    /// replaces the old one; `None` keeps it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::TaskActive`] for queued or running
    /// tasks, [`TaskLifecycleError::Domain`] for terminal-sourced tasks and
    /// tasks awaiting review, and [`TaskLifecycleError::Conflict`] when the
    /// task changed concurrently.
    #[tracing::instrument(skip(self, feedback))]
    pub async fn rerun(
        &self,
        task_id: TaskId,
        feedback: Option<String>,
    ) -> TaskLifecycleResult<Task> {
        let mut task = self.load(task_id).await?;
        task.ensure_engine_managed()?;
        let expected = task.status();
        if expected.is_active() {
            return Err(TaskLifecycleError::TaskActive {
                task_id,
                status: expected,
            });
        }

        task.rerun(feedback, &*self.clock)?;
        self.commit(&task, expected).await?;

        tracing::info!(from = %expected, retry_count = task.retry().retry_count(), "task rerun");
        self.emit(
            EventType::TaskRerun,
            json!({
                "task_id": task_id,
                "from": expected,
                "retry_count": task.retry().retry_count(),
                "max_retries": task.retry().max_retries(),
            }),
        );
        Ok(task)
    }

    /// Records that a worker started executing a queued task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] unless the task is queued and
    /// [`TaskLifecycleError::Conflict`] when it changed concurrently.
    #[tracing::instrument(skip(self))]
    pub async fn mark_running(
        &self,
        task_id: TaskId,
        worker_id: WorkerId,
    ) -> TaskLifecycleResult<Task> {
        let mut task = self.load(task_id).await?;
        let expected = task.status();
        task.start(worker_id, &*self.clock)?;
        self.commit(&task, expected).await?;

        tracing::debug!("task started");
        self.emit(
            EventType::TaskStarted,
            json!({ "task_id": task_id, "worker_id": worker_id }),
        );
        Ok(task)
    }

    /// Records that execution finished.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] unless the task is running and
    /// [`TaskLifecycleError::Conflict`] when it changed concurrently.
    #[tracing::instrument(skip(self))]
    pub async fn mark_finished(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        let mut task = self.load(task_id).await?;
        let expected = task.status();
        let worker_id = task.assigned_worker_id();
        let landed = task.finish(&*self.clock)?;
        self.commit(&task, expected).await?;

        tracing::debug!(to = %landed, "task finished");
        self.emit(
            EventType::TaskFinished,
            json!({ "task_id": task_id, "worker_id": worker_id, "status": landed }),
        );
        Ok(task)
    }

    /// Records an execution error.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] unless the task is running and
    /// [`TaskLifecycleError::Conflict`] when it changed concurrently.
    #[tracing::instrument(skip(self, message))]
    pub async fn mark_failed(
        &self,
        task_id: TaskId,
        message: impl Into<String> + Send,
    ) -> TaskLifecycleResult<Task> {
        let mut task = self.load(task_id).await?;
        let expected = task.status();
        let worker_id = task.assigned_worker_id();
        task.fail(message, &*self.clock)?;
        self.commit(&task, expected).await?;

        tracing::info!("task failed during execution");
        self.emit(
            EventType::TaskFailed,
            json!({
                "task_id": task_id,
                "worker_id": worker_id,
                "error": task.error_message(),
            }),
        );
        Ok(task)
    }

    pub(super) async fn load(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        self.repository
            .find_by_id(task_id)
            .await?
            .ok_or(TaskLifecycleError::NotFound(task_id))
    }

    /// Writes `task` if the stored status still equals `expected`.
    pub(super) async fn commit(
        &self,
        task: &Task,
        expected: TaskStatus,
    ) -> TaskLifecycleResult<()> {
        match self.repository.update_if_status(task, expected).await? {
            WriteOutcome::Applied => Ok(()),
            WriteOutcome::Stale => {
                tracing::warn!(task_id = %task.id(), %expected, "task changed before the write");
                Err(TaskLifecycleError::Conflict {
                    task_id: task.id(),
                    expected,
                })
            }
        }
    }

    pub(super) fn emit(&self, event_type: EventType, payload: Value) {
        self.emitter
            .emit(EngineEvent::new(event_type, payload, self.clock.utc()));
    }
}
