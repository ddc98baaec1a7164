//! In-memory worker repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::store::WriteOutcome;
use crate::worker::{
    domain::{Worker, WorkerId, WorkerStatus},
    ports::{WorkerRepository, WorkerRepositoryError, WorkerRepositoryResult},
};

/// Thread-safe in-memory worker repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkerRepository {
    state: Arc<RwLock<HashMap<WorkerId, Worker>>>,
}

impl InMemoryWorkerRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> WorkerRepositoryResult<RwLockReadGuard<'_, HashMap<WorkerId, Worker>>> {
        self.state.read().map_err(|err| {
            WorkerRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> WorkerRepositoryResult<RwLockWriteGuard<'_, HashMap<WorkerId, Worker>>> {
        self.state.write().map_err(|err| {
            WorkerRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

fn sorted(workers: impl Iterator<Item = Worker>) -> Vec<Worker> {
    let mut collected: Vec<Worker> = workers.collect();
    collected.sort_by_key(|worker| (worker.created_at(), worker.id()));
    collected
}

#[async_trait]
impl WorkerRepository for InMemoryWorkerRepository {
    async fn store(&self, worker: &Worker) -> WorkerRepositoryResult<()> {
        let mut workers = self.write()?;
        if workers.contains_key(&worker.id()) {
            return Err(WorkerRepositoryError::DuplicateWorker(worker.id()));
        }
        workers.insert(worker.id(), worker.clone());
        Ok(())
    }

    async fn update_if_status(
        &self,
        worker: &Worker,
        expected: WorkerStatus,
    ) -> WorkerRepositoryResult<WriteOutcome> {
        let mut workers = self.write()?;
        let stored = workers
            .get_mut(&worker.id())
            .ok_or(WorkerRepositoryError::NotFound(worker.id()))?;
        if stored.status() != expected {
            return Ok(WriteOutcome::Stale);
        }
        *stored = worker.clone();
        Ok(WriteOutcome::Applied)
    }

    async fn update_assignment_if_status(
        &self,
        worker: &Worker,
        expected: WorkerStatus,
    ) -> WorkerRepositoryResult<WriteOutcome> {
        let mut workers = self.write()?;
        let stored = workers
            .get_mut(&worker.id())
            .ok_or(WorkerRepositoryError::NotFound(worker.id()))?;
        if stored.status() != expected {
            return Ok(WriteOutcome::Stale);
        }
        stored.adopt_assignment(worker);
        Ok(WriteOutcome::Applied)
    }

    async fn find_by_id(&self, id: WorkerId) -> WorkerRepositoryResult<Option<Worker>> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn list_all(&self) -> WorkerRepositoryResult<Vec<Worker>> {
        Ok(sorted(self.read()?.values().cloned()))
    }

    async fn list_by_status(&self, status: WorkerStatus) -> WorkerRepositoryResult<Vec<Worker>> {
        Ok(sorted(
            self.read()?
                .values()
                .filter(|worker| worker.status() == status)
                .cloned(),
        ))
    }

    async fn delete(&self, id: WorkerId) -> WorkerRepositoryResult<()> {
        self.write()?
            .remove(&id)
            .map(|_| ())
            .ok_or(WorkerRepositoryError::NotFound(id))
    }
}
