//! `PostgreSQL` repository implementation for task lifecycle storage.

use super::{
    models::{NewTaskRow, TaskChangeset, TaskRow},
    schema::tasks,
};
use crate::store::WriteOutcome;
use crate::task::{
    domain::{
        AgentId, GroupId, PersistedTaskData, RetryWindow, Task, TaskId, TaskSource, TaskStatus,
        VcsFields,
    },
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};
use crate::worker::domain::WorkerId;
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by engine adapters.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed task repository.
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: TaskPgPool,
}

impl PostgresTaskRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TaskPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskRepositoryError::persistence)?
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let new_row = to_new_row(task)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(tasks::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        TaskRepositoryError::DuplicateTask(task_id)
                    }
                    _ => TaskRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update_if_status(
        &self,
        task: &Task,
        expected: TaskStatus,
    ) -> TaskRepositoryResult<WriteOutcome> {
        let task_id = task.id();
        let changeset = to_changeset(task)?;

        self.run_blocking(move |connection| {
            let affected = diesel::update(
                tasks::table
                    .filter(tasks::id.eq(task_id.into_inner()))
                    .filter(tasks::status.eq(expected.as_str())),
            )
            .set(&changeset)
            .execute(connection)
            .map_err(TaskRepositoryError::persistence)?;

            let outcome = WriteOutcome::from_affected_rows(affected);
            if outcome.is_applied() || task_exists(connection, task_id)? {
                return Ok(outcome);
            }
            Err(TaskRepositoryError::NotFound(task_id))
        })
        .await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = tasks::table
                .filter(tasks::id.eq(id.into_inner()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn list_by_group(&self, group_id: GroupId) -> TaskRepositoryResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::group_id.eq(group_id.into_inner()))
                .order((tasks::created_at.asc(), tasks::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn list_by_status(&self, status: TaskStatus) -> TaskRepositoryResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::status.eq(status.as_str()))
                .order((tasks::created_at.asc(), tasks::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn delete(&self, id: TaskId) -> TaskRepositoryResult<()> {
        self.run_blocking(move |connection| {
            let affected = diesel::delete(tasks::table.filter(tasks::id.eq(id.into_inner())))
                .execute(connection)
                .map_err(TaskRepositoryError::persistence)?;
            if affected == 0 {
                return Err(TaskRepositoryError::NotFound(id));
            }
            Ok(())
        })
        .await
    }
}

fn task_exists(connection: &mut PgConnection, id: TaskId) -> TaskRepositoryResult<bool> {
    diesel::select(diesel::dsl::exists(
        tasks::table.filter(tasks::id.eq(id.into_inner())),
    ))
    .get_result::<bool>(connection)
    .map_err(TaskRepositoryError::persistence)
}

fn to_i32(value: u32) -> TaskRepositoryResult<i32> {
    i32::try_from(value).map_err(TaskRepositoryError::persistence)
}

fn to_u32(value: i32) -> TaskRepositoryResult<u32> {
    u32::try_from(value).map_err(TaskRepositoryError::invalid_persisted_data)
}

fn to_new_row(task: &Task) -> TaskRepositoryResult<NewTaskRow> {
    let depends_on =
        serde_json::to_value(task.depends_on()).map_err(TaskRepositoryError::persistence)?;
    let vcs = task.vcs().clone();

    Ok(NewTaskRow {
        id: task.id().into_inner(),
        group_id: task.group_id().map(GroupId::into_inner),
        title: task.title().to_owned(),
        prompt: task.prompt().to_owned(),
        agent: task.agent().as_str().to_owned(),
        status: task.status().as_str().to_owned(),
        source: task.source().as_str().to_owned(),
        depends_on,
        retry_count: to_i32(task.retry().retry_count())?,
        max_retries: to_i32(task.retry().max_retries())?,
        feedback: task.feedback().map(str::to_owned),
        review_comment: task.review_comment().map(str::to_owned),
        error_message: task.error_message().map(str::to_owned),
        requires_review: task.requires_review(),
        assigned_worker_id: task.assigned_worker_id().map(WorkerId::into_inner),
        repo_url: vcs.repo_url,
        base_branch: vcs.base_branch,
        work_branch: vcs.work_branch,
        pr_url: vcs.pr_url,
        queued_at: task.queued_at(),
        started_at: task.started_at(),
        completed_at: task.completed_at(),
        reviewed_at: task.reviewed_at(),
        created_at: task.created_at(),
        updated_at: task.updated_at(),
    })
}

fn to_changeset(task: &Task) -> TaskRepositoryResult<TaskChangeset> {
    let depends_on =
        serde_json::to_value(task.depends_on()).map_err(TaskRepositoryError::persistence)?;
    let vcs = task.vcs().clone();

    Ok(TaskChangeset {
        status: task.status().as_str().to_owned(),
        source: task.source().as_str().to_owned(),
        depends_on,
        retry_count: to_i32(task.retry().retry_count())?,
        max_retries: to_i32(task.retry().max_retries())?,
        feedback: task.feedback().map(str::to_owned),
        review_comment: task.review_comment().map(str::to_owned),
        error_message: task.error_message().map(str::to_owned),
        requires_review: task.requires_review(),
        assigned_worker_id: task.assigned_worker_id().map(WorkerId::into_inner),
        repo_url: vcs.repo_url,
        base_branch: vcs.base_branch,
        work_branch: vcs.work_branch,
        pr_url: vcs.pr_url,
        queued_at: task.queued_at(),
        started_at: task.started_at(),
        completed_at: task.completed_at(),
        reviewed_at: task.reviewed_at(),
        updated_at: task.updated_at(),
    })
}

fn row_to_task(row: TaskRow) -> TaskRepositoryResult<Task> {
    let TaskRow {
        id,
        group_id,
        title,
        prompt,
        agent: persisted_agent,
        status: persisted_status,
        source: persisted_source,
        depends_on: persisted_depends_on,
        retry_count,
        max_retries,
        feedback,
        review_comment,
        error_message,
        requires_review,
        assigned_worker_id,
        repo_url,
        base_branch,
        work_branch,
        pr_url,
        queued_at,
        started_at,
        completed_at,
        reviewed_at,
        created_at,
        updated_at,
    } = row;

    let agent =
        AgentId::new(persisted_agent).map_err(TaskRepositoryError::invalid_persisted_data)?;
    let status = TaskStatus::try_from(persisted_status.as_str())
        .map_err(TaskRepositoryError::invalid_persisted_data)?;
    let source = TaskSource::try_from(persisted_source.as_str())
        .map_err(TaskRepositoryError::invalid_persisted_data)?;
    let depends_on = serde_json::from_value::<Vec<TaskId>>(persisted_depends_on)
        .map_err(TaskRepositoryError::invalid_persisted_data)?;

    let data = PersistedTaskData {
        id: TaskId::from_uuid(id),
        group_id: group_id.map(GroupId::from_uuid),
        title,
        prompt,
        agent,
        status,
        source,
        depends_on,
        retry: RetryWindow::new(to_u32(retry_count)?, to_u32(max_retries)?),
        feedback,
        review_comment,
        error_message,
        requires_review,
        assigned_worker_id: assigned_worker_id.map(WorkerId::from_uuid),
        vcs: VcsFields {
            repo_url,
            base_branch,
            work_branch,
            pr_url,
        },
        queued_at,
        started_at,
        completed_at,
        reviewed_at,
        created_at,
        updated_at,
    };
    Ok(Task::from_persisted(data))
}
