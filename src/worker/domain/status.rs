//! Worker status and run mode.

use super::ParseWorkerStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Availability of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// Ready to accept a task.
    Idle,
    /// Executing a task.
    Busy,
    /// Taken out of rotation; only an explicit activation brings it back.
    Offline,
    /// Finishing current work before decommission; accepts nothing new.
    Draining,
}

impl WorkerStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Offline => "offline",
            Self::Draining => "draining",
        }
    }

    /// Returns whether a worker in this status must not reference a task.
    #[must_use]
    pub const fn clears_current_task(self) -> bool {
        matches!(self, Self::Idle | Self::Offline)
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for WorkerStatus {
    type Error = ParseWorkerStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "idle" => Ok(Self::Idle),
            "busy" => Ok(Self::Busy),
            "offline" => Ok(Self::Offline),
            "draining" => Ok(Self::Draining),
            _ => Err(ParseWorkerStatusError(value.to_owned())),
        }
    }
}

/// How the worker process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMode {
    /// Long-lived daemon polling for work.
    Daemon,
    /// One-shot process started for a single task.
    Task,
    /// The worker has not said.
    #[default]
    Unknown,
}

impl WorkerMode {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daemon => "daemon",
            Self::Task => "task",
            Self::Unknown => "unknown",
        }
    }
}

impl From<&str> for WorkerMode {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "daemon" => Self::Daemon,
            "task" => Self::Task,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for WorkerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
