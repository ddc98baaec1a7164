//! Reconciliation of self-reported worker status against stored status.

use super::{WorkerCapabilities, WorkerId, WorkerMode, WorkerStatus, WorkerTelemetry};
use crate::task::domain::TaskId;

/// One heartbeat as sent by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatReport {
    /// Reporting worker.
    pub worker_id: WorkerId,
    /// Status the worker believes it is in.
    pub status: WorkerStatus,
    /// Task the worker claims to be executing.
    pub task_id: Option<TaskId>,
    /// Resource usage.
    pub telemetry: WorkerTelemetry,
    /// Run mode, when reported.
    pub mode: Option<WorkerMode>,
    /// Refreshed capabilities, when reported.
    pub capabilities: Option<WorkerCapabilities>,
}

impl HeartbeatReport {
    /// Creates a report carrying only status and task.
    #[must_use]
    pub fn new(worker_id: WorkerId, status: WorkerStatus, task_id: Option<TaskId>) -> Self {
        Self {
            worker_id,
            status,
            task_id,
            telemetry: WorkerTelemetry::default(),
            mode: None,
            capabilities: None,
        }
    }

    /// Attaches resource telemetry.
    #[must_use]
    pub const fn with_telemetry(mut self, telemetry: WorkerTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Attaches the run mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: WorkerMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Attaches refreshed capabilities.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: WorkerCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }
}

/// Decides which status to store for a heartbeat.
///
/// Administrative states are sticky against self-reports: a draining worker
/// reporting `idle` or `busy` stays draining, and an offline worker stays
/// offline whatever it reports. Otherwise the report wins.
#[must_use]
pub const fn resolve_status(stored: WorkerStatus, reported: WorkerStatus) -> WorkerStatus {
    match (stored, reported) {
        (WorkerStatus::Draining, WorkerStatus::Idle | WorkerStatus::Busy) => {
            WorkerStatus::Draining
        }
        (WorkerStatus::Offline, _) => WorkerStatus::Offline,
        (_, reported_status) => reported_status,
    }
}

/// Decides which task reference to store alongside `status`.
///
/// Idle and offline workers never reference a task, whatever was reported.
#[must_use]
pub const fn resolve_current_task(
    status: WorkerStatus,
    reported_task: Option<TaskId>,
) -> Option<TaskId> {
    if status.clears_current_task() {
        None
    } else {
        reported_task
    }
}
