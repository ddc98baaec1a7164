//! Review decisions on finished work.

use super::lifecycle::{TaskLifecycleError, TaskLifecycleResult, TaskLifecycleService};
use crate::events::{EventEmitter, EventType};
use crate::task::{
    domain::{PullRequestRef, RejectionOutcome, Task, TaskId, TaskStatus},
    ports::{TaskRepository, VcsClient},
};
use mockable::Clock;
use serde_json::json;

/// Options for approving reviewed work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApproveRequest {
    comment: Option<String>,
    merge: bool,
}

impl ApproveRequest {
    /// Creates an approval with no comment that does not merge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a reviewer comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Merges the task's pull request before completing the task.
    #[must_use]
    pub const fn with_merge(mut self) -> Self {
        self.merge = true;
        self
    }
}

impl<R, V, E, C> TaskLifecycleService<R, V, E, C>
where
    R: TaskRepository,
    V: VcsClient,
    E: EventEmitter,
    C: Clock + Send + Sync,
{
    /// Approves a task awaiting review and completes it.
    ///
    /// With [`ApproveRequest::with_merge`], a pull request is opened and
    /// bound first when the task has none, the task is re-read to confirm it
    /// is still awaiting review, and only after a successful merge is it
    /// completed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] unless the task is a scheduler
    /// task awaiting review, [`TaskLifecycleError::Conflict`] when it changed
    /// concurrently, and [`TaskLifecycleError::Vcs`] when the provider fails;
    /// in every error case the task is not completed.
    #[tracing::instrument(skip(self, request), fields(merge = request.merge))]
    pub async fn approve(
        &self,
        task_id: TaskId,
        request: ApproveRequest,
    ) -> TaskLifecycleResult<Task> {
        let ApproveRequest { comment, merge } = request;
        let mut task = self.load(task_id).await?;
        task.clone().approve(comment.clone(), &*self.clock)?;

        if merge {
            task = self.merge_pull_request(task).await?;
        }

        let expected = task.status();
        task.approve(comment, &*self.clock)?;
        self.commit(&task, expected).await?;

        tracing::info!(merged = merge, "task approved");
        self.emit(
            EventType::TaskApproved,
            json!({
                "task_id": task_id,
                "merged": merge,
                "pr_url": task.vcs().pr_url,
                "comment": task.review_comment(),
            }),
        );
        Ok(task)
    }

    /// Rejects a task awaiting review.
    ///
    /// The task is requeued with the notes as feedback while retries remain
    /// and fails for good once the ceiling in force before this rejection is
    /// exceeded.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] unless the task is a scheduler
    /// task awaiting review and [`TaskLifecycleError::Conflict`] when it
    /// changed concurrently.
    #[tracing::instrument(skip(self, notes))]
    pub async fn reject(
        &self,
        task_id: TaskId,
        notes: impl Into<String> + Send,
    ) -> TaskLifecycleResult<Task> {
        let mut task = self.load(task_id).await?;
        let expected = task.status();
        let outcome = task.reject(notes, &*self.clock)?;
        self.commit(&task, expected).await?;

        let exhausted = outcome == RejectionOutcome::Exhausted;
        tracing::info!(
            exhausted,
            retry_count = task.retry().retry_count(),
            "task rejected"
        );
        self.emit(
            EventType::TaskRejected,
            json!({
                "task_id": task_id,
                "status": task.status(),
                "retry_count": task.retry().retry_count(),
                "max_retries": task.retry().max_retries(),
                "exhausted": exhausted,
            }),
        );
        if exhausted {
            self.emit(
                EventType::TaskFailed,
                json!({ "task_id": task_id, "reason": "retries exhausted after rejection" }),
            );
        }
        Ok(task)
    }

    /// Opens or reuses the pull request, re-checks the status, and merges.
    ///
    /// Returns the task as re-read immediately before the merge.
    async fn merge_pull_request(&self, task: Task) -> TaskLifecycleResult<Task> {
        let task_id = task.id();
        let pull_request = match task.vcs().pr_url.clone() {
            Some(url) => self.vcs.parse_pull_request_url(&url)?,
            None => self.bind_new_pull_request(task).await?,
        };

        let current = self.load(task_id).await?;
        if current.status() != TaskStatus::AwaitingReview {
            tracing::warn!(status = %current.status(), "task left review before merge");
            return Err(TaskLifecycleError::Conflict {
                task_id,
                expected: TaskStatus::AwaitingReview,
            });
        }

        self.vcs.merge_pull_request(&pull_request).await?;
        tracing::debug!(%pull_request, "pull request merged");
        Ok(current)
    }

    async fn bind_new_pull_request(&self, mut task: Task) -> TaskLifecycleResult<PullRequestRef> {
        let url = self.vcs.create_or_find_pull_request(&task).await?;
        let pull_request = self.vcs.parse_pull_request_url(&url)?;
        task.bind_pull_request(url, &*self.clock)?;
        self.commit(&task, TaskStatus::AwaitingReview).await?;
        tracing::debug!(%pull_request, "pull request bound to task");
        Ok(pull_request)
    }
}
