//! `PostgreSQL` repository implementation for worker storage.

use super::{
    models::{WorkerAssignmentChangeset, WorkerChangeset, WorkerRow},
    schema::workers,
};
use crate::store::WriteOutcome;
use crate::task::domain::TaskId;
use crate::worker::{
    domain::{PersistedWorkerData, Worker, WorkerId, WorkerMode, WorkerStatus},
    ports::{WorkerRepository, WorkerRepositoryError, WorkerRepositoryResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by worker adapters.
pub type WorkerPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed worker repository.
#[derive(Debug, Clone)]
pub struct PostgresWorkerRepository {
    pool: WorkerPgPool,
}

impl PostgresWorkerRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: WorkerPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> WorkerRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> WorkerRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(WorkerRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(WorkerRepositoryError::persistence)?
    }

    async fn load_where_status(
        &self,
        status: Option<WorkerStatus>,
    ) -> WorkerRepositoryResult<Vec<Worker>> {
        self.run_blocking(move |connection| {
            let mut query = workers::table
                .order((workers::created_at.asc(), workers::id.asc()))
                .select(WorkerRow::as_select())
                .into_boxed();
            if let Some(wanted) = status {
                query = query.filter(workers::status.eq(wanted.as_str()));
            }
            let rows = query
                .load::<WorkerRow>(connection)
                .map_err(WorkerRepositoryError::persistence)?;
            rows.into_iter().map(row_to_worker).collect()
        })
        .await
    }
}

#[async_trait]
impl WorkerRepository for PostgresWorkerRepository {
    async fn store(&self, worker: &Worker) -> WorkerRepositoryResult<()> {
        let worker_id = worker.id();
        let row = to_row(worker)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(workers::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        WorkerRepositoryError::DuplicateWorker(worker_id)
                    }
                    _ => WorkerRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update_if_status(
        &self,
        worker: &Worker,
        expected: WorkerStatus,
    ) -> WorkerRepositoryResult<WriteOutcome> {
        let worker_id = worker.id();
        let changeset = to_changeset(worker)?;

        self.run_blocking(move |connection| {
            let affected = diesel::update(
                workers::table
                    .filter(workers::id.eq(worker_id.into_inner()))
                    .filter(workers::status.eq(expected.as_str())),
            )
            .set(&changeset)
            .execute(connection)
            .map_err(WorkerRepositoryError::persistence)?;
            outcome_or_missing(connection, worker_id, affected)
        })
        .await
    }

    async fn update_assignment_if_status(
        &self,
        worker: &Worker,
        expected: WorkerStatus,
    ) -> WorkerRepositoryResult<WriteOutcome> {
        let worker_id = worker.id();
        let changeset = WorkerAssignmentChangeset {
            status: worker.status().as_str().to_owned(),
            current_task_id: worker.current_task_id().map(TaskId::into_inner),
            updated_at: worker.updated_at(),
        };

        self.run_blocking(move |connection| {
            let affected = diesel::update(
                workers::table
                    .filter(workers::id.eq(worker_id.into_inner()))
                    .filter(workers::status.eq(expected.as_str())),
            )
            .set(&changeset)
            .execute(connection)
            .map_err(WorkerRepositoryError::persistence)?;
            outcome_or_missing(connection, worker_id, affected)
        })
        .await
    }

    async fn find_by_id(&self, id: WorkerId) -> WorkerRepositoryResult<Option<Worker>> {
        self.run_blocking(move |connection| {
            let row = workers::table
                .filter(workers::id.eq(id.into_inner()))
                .select(WorkerRow::as_select())
                .first::<WorkerRow>(connection)
                .optional()
                .map_err(WorkerRepositoryError::persistence)?;
            row.map(row_to_worker).transpose()
        })
        .await
    }

    async fn list_all(&self) -> WorkerRepositoryResult<Vec<Worker>> {
        self.load_where_status(None).await
    }

    async fn list_by_status(&self, status: WorkerStatus) -> WorkerRepositoryResult<Vec<Worker>> {
        self.load_where_status(Some(status)).await
    }

    async fn delete(&self, id: WorkerId) -> WorkerRepositoryResult<()> {
        self.run_blocking(move |connection| {
            let affected = diesel::delete(workers::table.filter(workers::id.eq(id.into_inner())))
                .execute(connection)
                .map_err(WorkerRepositoryError::persistence)?;
            if affected == 0 {
                return Err(WorkerRepositoryError::NotFound(id));
            }
            Ok(())
        })
        .await
    }
}

/// Maps a conditional update's row count, telling a stale row apart from
/// a missing one.
fn outcome_or_missing(
    connection: &mut PgConnection,
    worker_id: WorkerId,
    affected: usize,
) -> WorkerRepositoryResult<WriteOutcome> {
    let outcome = WriteOutcome::from_affected_rows(affected);
    if outcome.is_applied() {
        return Ok(outcome);
    }
    let exists = diesel::select(diesel::dsl::exists(
        workers::table.filter(workers::id.eq(worker_id.into_inner())),
    ))
    .get_result::<bool>(connection)
    .map_err(WorkerRepositoryError::persistence)?;
    if exists {
        Ok(outcome)
    } else {
        Err(WorkerRepositoryError::NotFound(worker_id))
    }
}

fn to_row(worker: &Worker) -> WorkerRepositoryResult<WorkerRow> {
    let changeset = to_changeset(worker)?;
    Ok(WorkerRow {
        id: worker.id().into_inner(),
        name: changeset.name,
        status: changeset.status,
        current_task_id: changeset.current_task_id,
        mode: changeset.mode,
        telemetry: changeset.telemetry,
        capabilities: changeset.capabilities,
        last_heartbeat_at: changeset.last_heartbeat_at,
        created_at: worker.created_at(),
        updated_at: changeset.updated_at,
    })
}

fn to_changeset(worker: &Worker) -> WorkerRepositoryResult<WorkerChangeset> {
    let telemetry =
        serde_json::to_value(worker.telemetry()).map_err(WorkerRepositoryError::persistence)?;
    let capabilities = serde_json::to_value(worker.capabilities())
        .map_err(WorkerRepositoryError::persistence)?;

    Ok(WorkerChangeset {
        name: worker.name().to_owned(),
        status: worker.status().as_str().to_owned(),
        current_task_id: worker.current_task_id().map(TaskId::into_inner),
        mode: worker.mode().as_str().to_owned(),
        telemetry,
        capabilities,
        last_heartbeat_at: worker.last_heartbeat_at(),
        updated_at: worker.updated_at(),
    })
}

fn row_to_worker(row: WorkerRow) -> WorkerRepositoryResult<Worker> {
    let WorkerRow {
        id,
        name,
        status: persisted_status,
        current_task_id,
        mode: persisted_mode,
        telemetry: persisted_telemetry,
        capabilities: persisted_capabilities,
        last_heartbeat_at,
        created_at,
        updated_at,
    } = row;

    let status = WorkerStatus::try_from(persisted_status.as_str())
        .map_err(WorkerRepositoryError::invalid_persisted_data)?;
    let telemetry = serde_json::from_value(persisted_telemetry)
        .map_err(WorkerRepositoryError::invalid_persisted_data)?;
    let capabilities = serde_json::from_value(persisted_capabilities)
        .map_err(WorkerRepositoryError::invalid_persisted_data)?;

    Ok(Worker::from_persisted(PersistedWorkerData {
        id: WorkerId::from_uuid(id),
        name,
        status,
        current_task_id: current_task_id.map(TaskId::from_uuid),
        mode: WorkerMode::from(persisted_mode.as_str()),
        telemetry,
        capabilities,
        last_heartbeat_at,
        created_at,
        updated_at,
    }))
}
