//! Event vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of transition an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// A task was created.
    #[serde(rename = "task.created")]
    TaskCreated,
    /// A finished task was replayed on its own.
    #[serde(rename = "task.rerun")]
    TaskRerun,
    /// Reviewed work was approved.
    #[serde(rename = "task.approved")]
    TaskApproved,
    /// Reviewed work was rejected and requeued.
    #[serde(rename = "task.rejected")]
    TaskRejected,
    /// A task failed, either on execution or after its last rejection.
    #[serde(rename = "task.failed")]
    TaskFailed,
    /// A group was replayed from one of its tasks.
    #[serde(rename = "task.restarted")]
    TaskRestarted,
    /// A waiting task's dependencies completed.
    #[serde(rename = "task.promoted")]
    TaskPromoted,
    /// A queued task was bound to a worker.
    #[serde(rename = "task.assigned")]
    TaskAssigned,
    /// A worker began executing a task.
    #[serde(rename = "task.started")]
    TaskStarted,
    /// A worker finished executing a task.
    #[serde(rename = "task.finished")]
    TaskFinished,
    /// A worker was registered.
    #[serde(rename = "worker.registered")]
    WorkerRegistered,
    /// A worker heartbeat was applied.
    #[serde(rename = "worker.heartbeat")]
    WorkerHeartbeat,
    /// A worker status was changed administratively.
    #[serde(rename = "worker.status_changed")]
    WorkerStatusChanged,
}

impl EventType {
    /// Returns the wire name of the event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskCreated => "task.created",
            Self::TaskRerun => "task.rerun",
            Self::TaskApproved => "task.approved",
            Self::TaskRejected => "task.rejected",
            Self::TaskFailed => "task.failed",
            Self::TaskRestarted => "task.restarted",
            Self::TaskPromoted => "task.promoted",
            Self::TaskAssigned => "task.assigned",
            Self::TaskStarted => "task.started",
            Self::TaskFinished => "task.finished",
            Self::WorkerRegistered => "worker.registered",
            Self::WorkerHeartbeat => "worker.heartbeat",
            Self::WorkerStatusChanged => "worker.status_changed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One emitted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Event kind.
    pub event_type: EventType,
    /// Event-specific payload.
    pub payload: Value,
    /// When the transition was applied.
    pub occurred_at: DateTime<Utc>,
}

impl EngineEvent {
    /// Creates an event.
    #[must_use]
    pub const fn new(event_type: EventType, payload: Value, occurred_at: DateTime<Utc>) -> Self {
        Self {
            event_type,
            payload,
            occurred_at,
        }
    }
}
