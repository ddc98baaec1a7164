//! Group-scoped replay from a chosen task.

use super::lifecycle::{TaskLifecycleError, TaskLifecycleResult, TaskLifecycleService};
use crate::events::{EventEmitter, EventType};
use crate::store::WriteOutcome;
use crate::task::{
    domain::{DependencyGraph, GroupId, ReplayTarget, Task, TaskId, TaskSource, TaskStatus},
    ports::{TaskRepository, TaskRepositoryError, VcsClient},
};
use mockable::Clock;
use serde_json::json;
use std::collections::HashMap;

/// What a restart actually changed.
///
/// Each task in the closure is written independently, so a concurrent
/// writer can cause some of them to be skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartFromReport {
    /// Tasks whose replay was written, in creation order.
    pub updated: Vec<TaskId>,
    /// Tasks in the closure that changed concurrently and were left alone.
    pub skipped: Vec<TaskId>,
    /// Whether the origin task landed in `queued`.
    pub from_task_queued: bool,
    /// Dependencies of the origin task that are not yet completed.
    pub outstanding_dependencies: Vec<TaskId>,
}

impl<R, V, E, C> TaskLifecycleService<R, V, E, C>
where
    R: TaskRepository,
    V: VcsClient,
    E: EventEmitter,
    C: Clock + Send + Sync,
{
    /// Replays `from_task_id` and everything downstream of it.
    ///
    /// The origin lands in `queued` when its own dependencies are complete
    /// and in `waiting` otherwise; every other task in the closure lands in
    /// `waiting`. Feedback, when given, is applied to the origin only.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::TaskNotInGroup`] when the origin is not
    /// a scheduler task of the group and
    /// [`TaskLifecycleError::RunningInClosure`] when any task in the
    /// closure is running; neither writes anything.
    #[tracing::instrument(skip(self, feedback))]
    pub async fn restart_from(
        &self,
        group_id: GroupId,
        from_task_id: TaskId,
        feedback: Option<String>,
    ) -> TaskLifecycleResult<RestartFromReport> {
        let group_tasks = self.repository.list_by_group(group_id).await?;
        let statuses: HashMap<TaskId, TaskStatus> = group_tasks
            .iter()
            .map(|task| (task.id(), task.status()))
            .collect();
        let scheduled: Vec<Task> = group_tasks
            .into_iter()
            .filter(|task| task.source() == TaskSource::Scheduler)
            .collect();

        let Some(origin) = scheduled.iter().find(|task| task.id() == from_task_id) else {
            return Err(TaskLifecycleError::TaskNotInGroup {
                group_id,
                task_id: from_task_id,
            });
        };
        let outstanding_dependencies: Vec<TaskId> = origin
            .depends_on()
            .iter()
            .copied()
            .filter(|dependency| statuses.get(dependency) != Some(&TaskStatus::Completed))
            .collect();

        let graph = DependencyGraph::from_tasks(&scheduled)?;
        let closure = graph.downstream_closure(from_task_id);
        let running: Vec<TaskId> = scheduled
            .iter()
            .filter(|task| closure.contains(&task.id()) && task.status() == TaskStatus::Running)
            .map(Task::id)
            .collect();
        if !running.is_empty() {
            tracing::warn!(?running, "restart refused: closure has running tasks");
            return Err(TaskLifecycleError::RunningInClosure {
                group_id,
                task_ids: running,
            });
        }

        let origin_target = if outstanding_dependencies.is_empty() {
            ReplayTarget::Queued
        } else {
            ReplayTarget::Waiting
        };

        let mut updated = Vec::new();
        let mut skipped = Vec::new();
        for mut task in scheduled
            .into_iter()
            .filter(|task| closure.contains(&task.id()))
        {
            let task_id = task.id();
            let expected = task.status();
            let (target, task_feedback) = if task_id == from_task_id {
                (origin_target, feedback.clone())
            } else {
                (ReplayTarget::Waiting, None)
            };
            task.restart(target, task_feedback, &*self.clock)?;

            match self.repository.update_if_status(&task, expected).await {
                Ok(WriteOutcome::Applied) => {
                    tracing::debug!(%task_id, from = %expected, to = %task.status(), "task reset");
                    updated.push(task_id);
                }
                Ok(WriteOutcome::Stale) | Err(TaskRepositoryError::NotFound(_)) => {
                    tracing::warn!(%task_id, %expected, "task changed during restart, skipped");
                    skipped.push(task_id);
                }
                Err(err) => return Err(err.into()),
            }
        }

        let report = RestartFromReport {
            from_task_queued: origin_target == ReplayTarget::Queued
                && updated.contains(&from_task_id),
            updated,
            skipped,
            outstanding_dependencies,
        };
        tracing::info!(
            updated = report.updated.len(),
            skipped = report.skipped.len(),
            from_task_queued = report.from_task_queued,
            "group restarted"
        );
        self.emit(
            EventType::TaskRestarted,
            json!({
                "group_id": group_id,
                "from_task_id": from_task_id,
                "updated": report.updated,
                "skipped": report.skipped,
                "from_task_queued": report.from_task_queued,
                "outstanding_dependencies": report.outstanding_dependencies,
            }),
        );
        Ok(report)
    }
}
