//! Task aggregate root and its lifecycle transitions.

use super::{
    AgentId, GroupId, RetryWindow, TaskDomainError, TaskId, TaskSource, TaskStatus, VcsFields,
};
use crate::worker::domain::WorkerId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Status a replayed task lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplayTarget {
    /// Ready for the scheduler right away.
    Queued,
    /// Held until its dependencies complete.
    Waiting,
}

impl ReplayTarget {
    /// Returns the task status corresponding to this target.
    #[must_use]
    pub const fn status(self) -> TaskStatus {
        match self {
            Self::Queued => TaskStatus::Queued,
            Self::Waiting => TaskStatus::Waiting,
        }
    }
}

/// Result of a review rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionOutcome {
    /// Retries remained; the task went back to the queue.
    Requeued,
    /// The retry ceiling was reached; the task failed for good.
    Exhausted,
}

/// Validated input for a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    /// Short human-readable summary.
    pub title: String,
    /// Instructions handed to the agent.
    pub prompt: String,
    /// Agent CLI the task requires.
    pub agent: AgentId,
    /// Pipeline run the task belongs to.
    pub group_id: Option<GroupId>,
    /// Tasks in the same group that must complete first.
    pub depends_on: Vec<TaskId>,
    /// Initial retry ceiling.
    pub max_retries: u32,
    /// Whether the task is engine-driven or interactive.
    pub source: TaskSource,
    /// Whether finished work waits for a human review.
    pub requires_review: bool,
    /// Repository and branch coordinates.
    pub vcs: VcsFields,
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    group_id: Option<GroupId>,
    title: String,
    prompt: String,
    agent: AgentId,
    status: TaskStatus,
    source: TaskSource,
    depends_on: Vec<TaskId>,
    retry: RetryWindow,
    feedback: Option<String>,
    review_comment: Option<String>,
    error_message: Option<String>,
    requires_review: bool,
    assigned_worker_id: Option<WorkerId>,
    vcs: VcsFields,
    queued_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted group identifier.
    pub group_id: Option<GroupId>,
    /// Persisted title.
    pub title: String,
    /// Persisted prompt.
    pub prompt: String,
    /// Persisted agent requirement.
    pub agent: AgentId,
    /// Persisted lifecycle status.
    pub status: TaskStatus,
    /// Persisted source.
    pub source: TaskSource,
    /// Persisted dependency list.
    pub depends_on: Vec<TaskId>,
    /// Persisted retry counters.
    pub retry: RetryWindow,
    /// Persisted feedback for the next attempt.
    pub feedback: Option<String>,
    /// Persisted reviewer comment.
    pub review_comment: Option<String>,
    /// Persisted execution error.
    pub error_message: Option<String>,
    /// Persisted review requirement.
    pub requires_review: bool,
    /// Persisted worker binding.
    pub assigned_worker_id: Option<WorkerId>,
    /// Persisted VCS coordinates.
    pub vcs: VcsFields,
    /// Persisted queue timestamp.
    pub queued_at: Option<DateTime<Utc>>,
    /// Persisted start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Persisted completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Persisted review timestamp.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest lifecycle timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new task in [`TaskStatus::Waiting`].
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] when the title is blank.
    pub fn new(draft: TaskDraft, clock: &impl Clock) -> Result<Self, TaskDomainError> {
        let title = draft.title.trim().to_owned();
        if title.is_empty() {
            return Err(TaskDomainError::EmptyTitle);
        }
        let mut depends_on = Vec::with_capacity(draft.depends_on.len());
        for dependency in draft.depends_on {
            if !depends_on.contains(&dependency) {
                depends_on.push(dependency);
            }
        }

        let timestamp = clock.utc();
        Ok(Self {
            id: TaskId::new(),
            group_id: draft.group_id,
            title,
            prompt: draft.prompt,
            agent: draft.agent,
            status: TaskStatus::Waiting,
            source: draft.source,
            depends_on,
            retry: RetryWindow::with_max_retries(draft.max_retries),
            feedback: None,
            review_comment: None,
            error_message: None,
            requires_review: draft.requires_review,
            assigned_worker_id: None,
            vcs: draft.vcs,
            queued_at: None,
            started_at: None,
            completed_at: None,
            reviewed_at: None,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            group_id: data.group_id,
            title: data.title,
            prompt: data.prompt,
            agent: data.agent,
            status: data.status,
            source: data.source,
            depends_on: data.depends_on,
            retry: data.retry,
            feedback: data.feedback,
            review_comment: data.review_comment,
            error_message: data.error_message,
            requires_review: data.requires_review,
            assigned_worker_id: data.assigned_worker_id,
            vcs: data.vcs,
            queued_at: data.queued_at,
            started_at: data.started_at,
            completed_at: data.completed_at,
            reviewed_at: data.reviewed_at,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the pipeline group, if any.
    #[must_use]
    pub const fn group_id(&self) -> Option<GroupId> {
        self.group_id
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the agent prompt.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Returns the agent the task requires.
    #[must_use]
    pub const fn agent(&self) -> &AgentId {
        &self.agent
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the task source.
    #[must_use]
    pub const fn source(&self) -> TaskSource {
        self.source
    }

    /// Returns the dependency list in declaration order.
    #[must_use]
    pub fn depends_on(&self) -> &[TaskId] {
        &self.depends_on
    }

    /// Returns the retry counters.
    #[must_use]
    pub const fn retry(&self) -> RetryWindow {
        self.retry
    }

    /// Returns feedback carried into the next attempt.
    #[must_use]
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    /// Returns the latest reviewer comment.
    #[must_use]
    pub fn review_comment(&self) -> Option<&str> {
        self.review_comment.as_deref()
    }

    /// Returns the latest execution error reported by a worker.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns whether finished work waits for a review decision.
    #[must_use]
    pub const fn requires_review(&self) -> bool {
        self.requires_review
    }

    /// Returns the worker the task is bound to.
    #[must_use]
    pub const fn assigned_worker_id(&self) -> Option<WorkerId> {
        self.assigned_worker_id
    }

    /// Returns the VCS coordinates.
    #[must_use]
    pub const fn vcs(&self) -> &VcsFields {
        &self.vcs
    }

    /// Returns when the task last entered the queue.
    #[must_use]
    pub const fn queued_at(&self) -> Option<DateTime<Utc>> {
        self.queued_at
    }

    /// Returns when the current attempt started running.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns when the task reached a finished state.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns when the latest review decision was recorded.
    #[must_use]
    pub const fn reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.reviewed_at
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest lifecycle timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Rejects tasks that are driven interactively.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InteractiveTask`] for terminal-sourced tasks.
    pub const fn ensure_engine_managed(&self) -> Result<(), TaskDomainError> {
        match self.source {
            TaskSource::Scheduler => Ok(()),
            TaskSource::Terminal => Err(TaskDomainError::InteractiveTask(self.id)),
        }
    }

    /// Moves a waiting task into the queue once its dependencies completed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless the task is
    /// waiting.
    pub fn promote(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.ensure_status(TaskStatus::Waiting, "be promoted")?;
        let timestamp = clock.utc();
        self.status = TaskStatus::Queued;
        self.queued_at = Some(timestamp);
        self.updated_at = timestamp;
        Ok(())
    }

    /// Binds a queued task to a worker and marks it running.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless the task is
    /// queued.
    pub fn start(
        &mut self,
        worker_id: WorkerId,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.ensure_status(TaskStatus::Queued, "start")?;
        let timestamp = clock.utc();
        self.status = TaskStatus::Running;
        self.assigned_worker_id = Some(worker_id);
        self.started_at = Some(timestamp);
        self.error_message = None;
        self.updated_at = timestamp;
        Ok(())
    }

    /// Records that execution finished.
    ///
    /// Tasks requiring review move to [`TaskStatus::AwaitingReview`]; others
    /// complete immediately. Either way the worker binding is released.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless the task is
    /// running.
    pub fn finish(&mut self, clock: &impl Clock) -> Result<TaskStatus, TaskDomainError> {
        self.ensure_status(TaskStatus::Running, "finish")?;
        let timestamp = clock.utc();
        self.assigned_worker_id = None;
        self.updated_at = timestamp;
        if self.requires_review {
            self.status = TaskStatus::AwaitingReview;
        } else {
            self.status = TaskStatus::Completed;
            self.completed_at = Some(timestamp);
        }
        Ok(self.status)
    }

    /// Records an execution error.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless the task is
    /// running.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.ensure_status(TaskStatus::Running, "fail")?;
        let timestamp = clock.utc();
        self.status = TaskStatus::Failed;
        self.error_message = Some(message.into());
        self.assigned_worker_id = None;
        self.completed_at = Some(timestamp);
        self.updated_at = timestamp;
        Ok(())
    }

    /// Replays a finished task from scratch.
    ///
    /// Replacement feedback is applied when given; otherwise the previous
    /// feedback is kept. The retry window always advances.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InteractiveTask`] for terminal-sourced
    /// tasks, [`TaskDomainError::ReviewPending`] while a review decision is
    /// outstanding, and [`TaskDomainError::InvalidTransition`] for any other
    /// non-terminal status.
    pub fn rerun(
        &mut self,
        feedback: Option<String>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.ensure_engine_managed()?;
        match self.status {
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {}
            TaskStatus::AwaitingReview => return Err(TaskDomainError::ReviewPending(self.id)),
            from @ (TaskStatus::Waiting | TaskStatus::Queued | TaskStatus::Running) => {
                return Err(TaskDomainError::InvalidTransition {
                    task_id: self.id,
                    from,
                    operation: "be rerun",
                });
            }
        }
        self.replay(ReplayTarget::Queued, feedback, clock);
        Ok(())
    }

    /// Resets a task as part of a group restart.
    ///
    /// The retry window advances only when the task already consumed an
    /// attempt.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InteractiveTask`] for terminal-sourced
    /// tasks and [`TaskDomainError::InvalidTransition`] for running tasks.
    pub fn restart(
        &mut self,
        target: ReplayTarget,
        feedback: Option<String>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.ensure_engine_managed()?;
        if self.status == TaskStatus::Running {
            return Err(TaskDomainError::InvalidTransition {
                task_id: self.id,
                from: self.status,
                operation: "be restarted",
            });
        }
        self.replay(target, feedback, clock);
        Ok(())
    }

    /// Approves reviewed work and completes the task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InteractiveTask`] for terminal-sourced
    /// tasks and [`TaskDomainError::InvalidTransition`] unless the task is
    /// awaiting review.
    pub fn approve(
        &mut self,
        comment: Option<String>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.ensure_reviewable("be approved")?;
        let timestamp = clock.utc();
        self.status = TaskStatus::Completed;
        self.review_comment = comment;
        self.reviewed_at = Some(timestamp);
        self.completed_at = Some(timestamp);
        self.assigned_worker_id = None;
        self.updated_at = timestamp;
        Ok(())
    }

    /// Rejects reviewed work.
    ///
    /// The retry window advances; if the new count exceeds the ceiling that
    /// applied before the rejection the task fails for good, otherwise it is
    /// requeued with the reviewer notes as feedback.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InteractiveTask`] for terminal-sourced
    /// tasks and [`TaskDomainError::InvalidTransition`] unless the task is
    /// awaiting review.
    pub fn reject(
        &mut self,
        reviewer_notes: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<RejectionOutcome, TaskDomainError> {
        self.ensure_reviewable("be rejected")?;
        let notes = reviewer_notes.into();
        let timestamp = clock.utc();
        let next = self.retry.advance(true);
        let exhausted = self.retry.is_exhausted_by(next);

        self.retry = next;
        self.feedback = Some(notes.clone());
        self.assigned_worker_id = None;
        self.updated_at = timestamp;

        if exhausted {
            self.status = TaskStatus::Failed;
            self.review_comment = Some(notes);
            self.reviewed_at = Some(timestamp);
            self.completed_at = Some(timestamp);
            return Ok(RejectionOutcome::Exhausted);
        }

        self.status = TaskStatus::Queued;
        self.queued_at = Some(timestamp);
        self.started_at = None;
        self.completed_at = None;
        Ok(RejectionOutcome::Requeued)
    }

    /// Records the pull request opened for the task's work branch.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTransition`] unless the task is
    /// awaiting review.
    pub fn bind_pull_request(
        &mut self,
        pr_url: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.ensure_status(TaskStatus::AwaitingReview, "bind a pull request")?;
        self.vcs.pr_url = Some(pr_url.into());
        self.updated_at = clock.utc();
        Ok(())
    }

    fn replay(&mut self, target: ReplayTarget, feedback: Option<String>, clock: &impl Clock) {
        let timestamp = clock.utc();
        self.retry = self.retry.advance(self.status.is_terminal_like());
        self.status = target.status();
        if feedback.is_some() {
            self.feedback = feedback;
        }
        self.assigned_worker_id = None;
        self.error_message = None;
        self.queued_at = match target {
            ReplayTarget::Queued => Some(timestamp),
            ReplayTarget::Waiting => None,
        };
        self.started_at = None;
        self.completed_at = None;
        self.reviewed_at = None;
        self.updated_at = timestamp;
    }

    fn ensure_reviewable(&self, operation: &'static str) -> Result<(), TaskDomainError> {
        self.ensure_engine_managed()?;
        self.ensure_status(TaskStatus::AwaitingReview, operation)
    }

    fn ensure_status(
        &self,
        expected: TaskStatus,
        operation: &'static str,
    ) -> Result<(), TaskDomainError> {
        if self.status == expected {
            return Ok(());
        }
        Err(TaskDomainError::InvalidTransition {
            task_id: self.id,
            from: self.status,
            operation,
        })
    }
}
