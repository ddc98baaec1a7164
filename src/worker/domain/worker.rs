//! Worker aggregate root.

use super::{
    HeartbeatReport, WorkerCapabilities, WorkerDomainError, WorkerId, WorkerMode, WorkerStatus,
    WorkerTelemetry, resolve_current_task, resolve_status,
};
use crate::task::domain::TaskId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Execution agent registered with the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    id: WorkerId,
    name: String,
    status: WorkerStatus,
    current_task_id: Option<TaskId>,
    mode: WorkerMode,
    telemetry: WorkerTelemetry,
    capabilities: WorkerCapabilities,
    last_heartbeat_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedWorkerData {
    /// Persisted identifier.
    pub id: WorkerId,
    /// Persisted display name.
    pub name: String,
    /// Persisted status.
    pub status: WorkerStatus,
    /// Persisted task reference.
    pub current_task_id: Option<TaskId>,
    /// Persisted run mode.
    pub mode: WorkerMode,
    /// Persisted telemetry.
    pub telemetry: WorkerTelemetry,
    /// Persisted capabilities.
    pub capabilities: WorkerCapabilities,
    /// Persisted heartbeat timestamp.
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Worker {
    /// Registers a new idle worker.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerDomainError::EmptyWorkerName`] for a blank name and
    /// [`WorkerDomainError::ZeroConcurrency`] when the capabilities allow no
    /// tasks.
    pub fn new(
        name: impl Into<String>,
        mode: WorkerMode,
        capabilities: WorkerCapabilities,
        clock: &impl Clock,
    ) -> Result<Self, WorkerDomainError> {
        let raw_name = name.into();
        let trimmed = raw_name.trim();
        if trimmed.is_empty() {
            return Err(WorkerDomainError::EmptyWorkerName);
        }
        if capabilities.max_concurrent_tasks() == 0 {
            return Err(WorkerDomainError::ZeroConcurrency);
        }
        let timestamp = clock.utc();
        Ok(Self {
            id: WorkerId::new(),
            name: trimmed.to_owned(),
            status: WorkerStatus::Idle,
            current_task_id: None,
            mode,
            telemetry: WorkerTelemetry::default(),
            capabilities,
            last_heartbeat_at: None,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Reconstructs a worker from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedWorkerData) -> Self {
        Self {
            id: data.id,
            name: data.name,
            status: data.status,
            current_task_id: data.current_task_id,
            mode: data.mode,
            telemetry: data.telemetry,
            capabilities: data.capabilities,
            last_heartbeat_at: data.last_heartbeat_at,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the worker identifier.
    #[must_use]
    pub const fn id(&self) -> WorkerId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stored status.
    #[must_use]
    pub const fn status(&self) -> WorkerStatus {
        self.status
    }

    /// Returns the task the worker is bound to.
    #[must_use]
    pub const fn current_task_id(&self) -> Option<TaskId> {
        self.current_task_id
    }

    /// Returns the run mode.
    #[must_use]
    pub const fn mode(&self) -> WorkerMode {
        self.mode
    }

    /// Returns the latest telemetry.
    #[must_use]
    pub const fn telemetry(&self) -> WorkerTelemetry {
        self.telemetry
    }

    /// Returns the worker capabilities.
    #[must_use]
    pub const fn capabilities(&self) -> &WorkerCapabilities {
        &self.capabilities
    }

    /// Returns when the last heartbeat was applied.
    #[must_use]
    pub const fn last_heartbeat_at(&self) -> Option<DateTime<Utc>> {
        self.last_heartbeat_at
    }

    /// Returns the registration timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Applies a heartbeat on top of the stored state and returns the
    /// resolved status.
    ///
    /// A reported concurrency budget of zero is ignored; the stored budget
    /// stays in force.
    pub fn apply_heartbeat(
        &mut self,
        report: &HeartbeatReport,
        clock: &impl Clock,
    ) -> WorkerStatus {
        let timestamp = clock.utc();
        let status = resolve_status(self.status, report.status);
        self.status = status;
        self.current_task_id = resolve_current_task(status, report.task_id);
        self.telemetry = report.telemetry;
        if let Some(mode) = report.mode {
            self.mode = mode;
        }
        if let Some(capabilities) = &report.capabilities {
            let budget = match capabilities.max_concurrent_tasks() {
                0 => self.capabilities.max_concurrent_tasks(),
                reported => reported,
            };
            self.capabilities = capabilities.clone().with_max_concurrent_tasks(budget);
        }
        self.last_heartbeat_at = Some(timestamp);
        self.updated_at = timestamp;
        status
    }

    /// Binds an idle worker to a task.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerDomainError::InvalidStatusChange`] unless the worker
    /// is idle.
    pub fn claim(&mut self, task_id: TaskId, clock: &impl Clock) -> Result<(), WorkerDomainError> {
        self.ensure_status(&[WorkerStatus::Idle], "take a task")?;
        self.status = WorkerStatus::Busy;
        self.current_task_id = Some(task_id);
        self.updated_at = clock.utc();
        Ok(())
    }

    /// Copies the status, bound task, and update timestamp of `other`.
    pub(crate) const fn adopt_assignment(&mut self, other: &Self) {
        self.status = other.status;
        self.current_task_id = other.current_task_id;
        self.updated_at = other.updated_at;
    }

    /// Undoes [`Worker::claim`] when the task side of a binding was lost.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerDomainError::InvalidStatusChange`] unless the worker
    /// is busy.
    pub fn release(&mut self, clock: &impl Clock) -> Result<(), WorkerDomainError> {
        self.ensure_status(&[WorkerStatus::Busy], "release a task")?;
        self.status = WorkerStatus::Idle;
        self.current_task_id = None;
        self.updated_at = clock.utc();
        Ok(())
    }

    /// Returns an offline or draining worker to service.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerDomainError::InvalidStatusChange`] unless the worker
    /// is offline or draining.
    pub fn activate(&mut self, clock: &impl Clock) -> Result<(), WorkerDomainError> {
        self.ensure_status(&[WorkerStatus::Offline, WorkerStatus::Draining], "be activated")?;
        self.status = WorkerStatus::Idle;
        self.current_task_id = None;
        self.updated_at = clock.utc();
        Ok(())
    }

    /// Schedules the worker for decommission; its current task is kept.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerDomainError::InvalidStatusChange`] unless the worker
    /// is idle or busy.
    pub fn drain(&mut self, clock: &impl Clock) -> Result<(), WorkerDomainError> {
        self.ensure_status(&[WorkerStatus::Idle, WorkerStatus::Busy], "be drained")?;
        self.status = WorkerStatus::Draining;
        self.updated_at = clock.utc();
        Ok(())
    }

    /// Takes the worker out of rotation.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerDomainError::InvalidStatusChange`] when the worker is
    /// already offline.
    pub fn deactivate(&mut self, clock: &impl Clock) -> Result<(), WorkerDomainError> {
        self.ensure_status(
            &[WorkerStatus::Idle, WorkerStatus::Busy, WorkerStatus::Draining],
            "be deactivated",
        )?;
        self.status = WorkerStatus::Offline;
        self.current_task_id = None;
        self.updated_at = clock.utc();
        Ok(())
    }

    fn ensure_status(
        &self,
        allowed: &[WorkerStatus],
        operation: &'static str,
    ) -> Result<(), WorkerDomainError> {
        if allowed.contains(&self.status) {
            return Ok(());
        }
        Err(WorkerDomainError::InvalidStatusChange {
            worker_id: self.id,
            from: self.status,
            operation,
        })
    }
}
