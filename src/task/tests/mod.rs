//! Unit tests for the task lifecycle.


use crate::store::WriteOutcome;
use crate::task::{
    adapters::memory::InMemoryTaskRepository,
    domain::{
        AgentId, GroupId, PersistedTaskData, RetryWindow, Task, TaskDraft, TaskId, TaskSource,
        TaskStatus, VcsFields,
    },
    ports::{TaskRepository, TaskRepositoryResult},
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

fn draft(title: &str) -> TaskDraft {
    TaskDraft {
        title: title.to_owned(),
        prompt: "Implement the change".to_owned(),
        agent: AgentId::new("claude").expect("valid agent"),
        group_id: None,
        depends_on: Vec::new(),
        max_retries: 2,
        source: TaskSource::Scheduler,
        requires_review: true,
        vcs: VcsFields::default(),
    }
}

/// Builds a stored task directly in `status`, created `age_secs` ago so
/// that listing order follows construction order.
fn stored_task(
    status: TaskStatus,
    group_id: Option<GroupId>,
    depends_on: Vec<TaskId>,
    age_secs: i64,
) -> Task {
    let created_at = Utc::now() - Duration::seconds(age_secs);
    Task::from_persisted(PersistedTaskData {
        id: TaskId::new(),
        group_id,
        title: "stored task".to_owned(),
        prompt: "Do the work".to_owned(),
        agent: AgentId::new("claude").expect("valid agent"),
        status,
        source: TaskSource::Scheduler,
        depends_on,
        retry: RetryWindow::with_max_retries(2),
        feedback: None,
        review_comment: None,
        error_message: None,
        requires_review: true,
        assigned_worker_id: None,
        vcs: VcsFields::default(),
        queued_at: None,
        started_at: None,
        completed_at: None,
        reviewed_at: None,
        created_at,
        updated_at: created_at,
    })
}

fn awaiting_review_with(retry: RetryWindow, vcs: VcsFields) -> Task {
    let created_at = Utc::now();
    Task::from_persisted(PersistedTaskData {
        id: TaskId::new(),
        group_id: None,
        title: "reviewed task".to_owned(),
        prompt: "Do the work".to_owned(),
        agent: AgentId::new("claude").expect("valid agent"),
        status: TaskStatus::AwaitingReview,
        source: TaskSource::Scheduler,
        depends_on: Vec::new(),
        retry,
        feedback: None,
        review_comment: None,
        error_message: None,
        requires_review: true,
        assigned_worker_id: None,
        vcs,
        queued_at: Some(created_at),
        started_at: Some(created_at),
        completed_at: None,
        reviewed_at: None,
        created_at,
        updated_at: created_at,
    })
}

/// Returns a copy of `source` as another writer would have left it in
/// `status`.
fn moved_to(source: &Task, status: TaskStatus) -> Task {
    Task::from_persisted(PersistedTaskData {
        id: source.id(),
        group_id: source.group_id(),
        title: source.title().to_owned(),
        prompt: source.prompt().to_owned(),
        agent: source.agent().clone(),
        status,
        source: source.source(),
        depends_on: source.depends_on().to_vec(),
        retry: source.retry(),
        feedback: source.feedback().map(str::to_owned),
        review_comment: source.review_comment().map(str::to_owned),
        error_message: source.error_message().map(str::to_owned),
        requires_review: source.requires_review(),
        assigned_worker_id: source.assigned_worker_id(),
        vcs: source.vcs().clone(),
        queued_at: source.queued_at(),
        started_at: source.started_at(),
        completed_at: source.completed_at(),
        reviewed_at: source.reviewed_at(),
        created_at: source.created_at(),
        updated_at: source.updated_at(),
    })
}

fn github_vcs() -> VcsFields {
    VcsFields {
        repo_url: Some("https://github.com/acme/widgets.git".to_owned()),
        base_branch: Some("main".to_owned()),
        work_branch: Some("drover/fix-parser".to_owned()),
        pr_url: None,
    }
}

/// Task repository whose first `stale_writes` conditional writes report a
/// lost race without touching the stored row.
#[derive(Debug, Clone)]
struct StaleWrites {
    inner: InMemoryTaskRepository,
    remaining: Arc<AtomicU32>,
}

impl StaleWrites {
    fn new(inner: InMemoryTaskRepository, stale_writes: u32) -> Self {
        Self {
            inner,
            remaining: Arc::new(AtomicU32::new(stale_writes)),
        }
    }
}

#[async_trait]
impl TaskRepository for StaleWrites {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        self.inner.store(task).await
    }

    async fn update_if_status(
        &self,
        task: &Task,
        expected: TaskStatus,
    ) -> TaskRepositoryResult<WriteOutcome> {
        let lost = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if lost {
            return Ok(WriteOutcome::Stale);
        }
        self.inner.update_if_status(task, expected).await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        self.inner.find_by_id(id).await
    }

    async fn list_by_group(&self, group_id: GroupId) -> TaskRepositoryResult<Vec<Task>> {
        self.inner.list_by_group(group_id).await
    }

    async fn list_by_status(&self, status: TaskStatus) -> TaskRepositoryResult<Vec<Task>> {
        self.inner.list_by_status(status).await
    }

    async fn delete(&self, id: TaskId) -> TaskRepositoryResult<()> {
        self.inner.delete(id).await
    }
}
