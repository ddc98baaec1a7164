//! Scheduler tick: promotion of ready tasks and binding to idle workers.

use super::selection::{WorkerLoad, is_eligible, running_load, select_worker};
use super::state::SchedulerState;
use crate::events::{EngineEvent, EventEmitter, EventType};
use crate::store::WriteOutcome;
use crate::task::{
    domain::{DependencyGraph, GroupId, Task, TaskDomainError, TaskId, TaskSource, TaskStatus},
    ports::{TaskRepository, TaskRepositoryError},
};
use crate::worker::{
    domain::{Worker, WorkerDomainError, WorkerId, WorkerStatus},
    ports::{WorkerRepository, WorkerRepositoryError},
};
use mockable::Clock;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Shortest period accepted by [`Scheduler::run_until`].
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Errors that abort a tick.
///
/// Lost races never abort a tick; they only skip the affected pairing.
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    /// Task repository operation failed.
    #[error(transparent)]
    TaskRepository(#[from] TaskRepositoryError),

    /// Worker repository operation failed.
    #[error(transparent)]
    WorkerRepository(#[from] WorkerRepositoryError),

    /// A task refused a transition the tick had checked for.
    #[error(transparent)]
    TaskDomain(#[from] TaskDomainError),

    /// A worker refused a transition the tick had checked for.
    #[error(transparent)]
    WorkerDomain(#[from] WorkerDomainError),
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// A task bound to a worker by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Assignment {
    /// Bound task.
    pub task_id: TaskId,
    /// Worker now executing it.
    pub worker_id: WorkerId,
}

/// Everything one tick changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Waiting tasks moved to `queued`.
    pub promoted: Vec<TaskId>,
    /// Queued tasks bound to workers.
    pub assigned: Vec<Assignment>,
    /// Queued tasks left for a later tick.
    pub unassigned: Vec<TaskId>,
}

impl TickReport {
    /// Returns whether the tick wrote anything.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.promoted.is_empty() && self.assigned.is_empty()
    }
}

/// Outcome of a tick request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick was in flight; nothing was read or written.
    AlreadyRunning,
    /// The tick ran to completion.
    Completed(TickReport),
}

/// Drives queued work onto idle workers.
#[derive(Clone)]
pub struct Scheduler<T, W, E, C>
where
    T: TaskRepository,
    W: WorkerRepository,
    E: EventEmitter,
    C: Clock + Send + Sync,
{
    tasks: Arc<T>,
    workers: Arc<W>,
    emitter: Arc<E>,
    clock: Arc<C>,
    state: Arc<SchedulerState>,
}

impl<T, W, E, C> Scheduler<T, W, E, C>
where
    T: TaskRepository,
    W: WorkerRepository,
    E: EventEmitter,
    C: Clock + Send + Sync,
{
    /// Creates a scheduler bound to shared engine state.
    #[must_use]
    pub const fn new(
        tasks: Arc<T>,
        workers: Arc<W>,
        emitter: Arc<E>,
        clock: Arc<C>,
        state: Arc<SchedulerState>,
    ) -> Self {
        Self {
            tasks,
            workers,
            emitter,
            clock,
            state,
        }
    }

    /// Returns the engine state this scheduler records into.
    #[must_use]
    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Runs one tick.
    ///
    /// Promotes waiting tasks whose dependencies completed, then binds
    /// queued tasks to eligible idle workers in queue order. Running it
    /// again with no intervening change writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] when a repository call fails. Writes made
    /// before the failure stay in place.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self) -> SchedulerResult<TickOutcome> {
        let Some(guard) = self.state.try_begin() else {
            tracing::debug!("tick skipped: previous tick still running");
            return Ok(TickOutcome::AlreadyRunning);
        };

        let promoted = self.promote_ready().await?;
        let (assigned, unassigned) = self.assign_queued().await?;
        guard.complete(self.clock.utc());

        let report = TickReport {
            promoted,
            assigned,
            unassigned,
        };
        if !report.is_noop() {
            tracing::info!(
                promoted = report.promoted.len(),
                assigned = report.assigned.len(),
                unassigned = report.unassigned.len(),
                "tick applied"
            );
        }
        Ok(TickOutcome::Completed(report))
    }

    /// Ticks every `interval` until `shutdown` turns `true` or its sender
    /// is dropped.
    ///
    /// Tick failures are logged and the loop carries on. Intervals shorter
    /// than one millisecond are raised to one millisecond.
    pub async fn run_until(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval.max(MIN_TICK_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        tracing::warn!(error = %err, "scheduler tick failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("scheduler stopped");
    }

    async fn promote_ready(&self) -> SchedulerResult<Vec<TaskId>> {
        let waiting = self.tasks.list_by_status(TaskStatus::Waiting).await?;
        let mut graphs: HashMap<GroupId, DependencyGraph> = HashMap::new();
        let mut promoted = Vec::new();

        for mut task in waiting
            .into_iter()
            .filter(|task| task.source() == TaskSource::Scheduler)
        {
            if !self.dependencies_completed(&task, &mut graphs).await? {
                continue;
            }
            task.promote(&*self.clock)?;
            match self.tasks.update_if_status(&task, TaskStatus::Waiting).await {
                Ok(WriteOutcome::Applied) => {
                    tracing::debug!(task_id = %task.id(), "task promoted");
                    self.emit(EventType::TaskPromoted, json!({ "task_id": task.id() }));
                    promoted.push(task.id());
                }
                Ok(WriteOutcome::Stale) | Err(TaskRepositoryError::NotFound(_)) => {
                    tracing::debug!(task_id = %task.id(), "waiting task changed, not promoted");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(promoted)
    }

    async fn dependencies_completed(
        &self,
        task: &Task,
        graphs: &mut HashMap<GroupId, DependencyGraph>,
    ) -> SchedulerResult<bool> {
        if task.depends_on().is_empty() {
            return Ok(true);
        }
        let Some(group_id) = task.group_id() else {
            for dependency in task.depends_on() {
                let status = self
                    .tasks
                    .find_by_id(*dependency)
                    .await?
                    .map(|found| found.status());
                if status != Some(TaskStatus::Completed) {
                    return Ok(false);
                }
            }
            return Ok(true);
        };

        if !graphs.contains_key(&group_id) {
            let members = self.tasks.list_by_group(group_id).await?;
            graphs.insert(group_id, DependencyGraph::from_tasks(&members)?);
        }
        Ok(graphs
            .get(&group_id)
            .is_some_and(|graph| graph.outstanding_dependencies(task.id()).is_empty()))
    }

    async fn assign_queued(&self) -> SchedulerResult<(Vec<Assignment>, Vec<TaskId>)> {
        let mut queued: Vec<Task> = self
            .tasks
            .list_by_status(TaskStatus::Queued)
            .await?
            .into_iter()
            .filter(|task| task.source() == TaskSource::Scheduler)
            .collect();
        if queued.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        queued.sort_by_key(|task| (task.queued_at(), task.created_at(), task.id()));

        let mut idle = self.workers.list_by_status(WorkerStatus::Idle).await?;
        let running = self.tasks.list_by_status(TaskStatus::Running).await?;
        let mut load = running_load(&running);
        let mut assigned = Vec::new();
        let mut unassigned = Vec::new();

        for task in queued {
            let Some(position) = select_worker(&idle, task.agent(), &load) else {
                unassigned.push(task.id());
                continue;
            };
            let worker_id = idle.swap_remove(position).id();
            let task_id = task.id();
            match self.bind(task, worker_id, &load).await? {
                BindOutcome::Bound(assignment) => {
                    let count = load.entry(assignment.worker_id).or_insert(0);
                    *count = count.saturating_add(1);
                    assigned.push(assignment);
                }
                BindOutcome::WorkerAvailable(available) => {
                    idle.push(available);
                    unassigned.push(task_id);
                }
                BindOutcome::Skipped => unassigned.push(task_id),
            }
        }
        Ok((assigned, unassigned))
    }

    /// Claims the worker, then the task; undoes the worker claim when the
    /// task side is lost.
    ///
    /// The worker is re-read so eligibility reflects its latest heartbeat,
    /// and only its assignment columns are written.
    async fn bind(
        &self,
        mut task: Task,
        worker_id: WorkerId,
        load: &WorkerLoad,
    ) -> SchedulerResult<BindOutcome> {
        let task_id = task.id();
        let Some(mut claimed) = self.workers.find_by_id(worker_id).await? else {
            tracing::debug!(%worker_id, %task_id, "worker removed before claim");
            return Ok(BindOutcome::Skipped);
        };
        if !is_eligible(&claimed, task.agent(), load) {
            tracing::debug!(%worker_id, %task_id, "worker no longer eligible");
            if claimed.status() == WorkerStatus::Idle {
                return Ok(BindOutcome::WorkerAvailable(claimed));
            }
            return Ok(BindOutcome::Skipped);
        }
        claimed.claim(task_id, &*self.clock)?;
        match self
            .workers
            .update_assignment_if_status(&claimed, WorkerStatus::Idle)
            .await
        {
            Ok(WriteOutcome::Applied) => {}
            Ok(WriteOutcome::Stale) | Err(WorkerRepositoryError::NotFound(_)) => {
                tracing::debug!(worker_id = %claimed.id(), %task_id, "worker no longer idle");
                return Ok(BindOutcome::Skipped);
            }
            Err(err) => return Err(err.into()),
        }

        task.start(claimed.id(), &*self.clock)?;
        match self.tasks.update_if_status(&task, TaskStatus::Queued).await {
            Ok(WriteOutcome::Applied) => {
                let assignment = Assignment {
                    task_id,
                    worker_id: claimed.id(),
                };
                tracing::debug!(%task_id, worker_id = %claimed.id(), "task assigned");
                self.emit(
                    EventType::TaskAssigned,
                    json!({ "task_id": task_id, "worker_id": claimed.id() }),
                );
                Ok(BindOutcome::Bound(assignment))
            }
            Ok(WriteOutcome::Stale) | Err(TaskRepositoryError::NotFound(_)) => {
                tracing::debug!(%task_id, "task no longer queued, releasing worker");
                Ok(self.release(claimed).await)
            }
            Err(err) => {
                self.release(claimed).await;
                Err(err.into())
            }
        }
    }

    async fn release(&self, mut claimed: Worker) -> BindOutcome {
        let worker_id = claimed.id();
        if let Err(err) = claimed.release(&*self.clock) {
            tracing::warn!(%worker_id, error = %err, "could not release claimed worker");
            return BindOutcome::Skipped;
        }
        match self
            .workers
            .update_assignment_if_status(&claimed, WorkerStatus::Busy)
            .await
        {
            Ok(WriteOutcome::Applied) => BindOutcome::WorkerAvailable(claimed),
            Ok(WriteOutcome::Stale) => {
                tracing::warn!(%worker_id, "worker changed before its claim was undone");
                BindOutcome::Skipped
            }
            Err(err) => {
                tracing::warn!(%worker_id, error = %err, "failed to undo worker claim");
                BindOutcome::Skipped
            }
        }
    }

    fn emit(&self, event_type: EventType, payload: Value) {
        self.emitter
            .emit(EngineEvent::new(event_type, payload, self.clock.utc()));
    }
}

enum BindOutcome {
    Bound(Assignment),
    WorkerAvailable(Worker),
    Skipped,
}

