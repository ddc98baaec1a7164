//! Error types for task domain validation, transitions, and parsing.

use super::{GroupId, TaskId, TaskStatus};
use thiserror::Error;

/// Errors returned while constructing or transitioning domain task values.
///
/// Every variant is a precondition violation: it is raised before any write
/// is attempted and leaves the task unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The VCS host value is unsupported.
    #[error("unsupported VCS host: {0}")]
    InvalidVcsHost(String),

    /// The repository name does not follow `owner/repo` format.
    #[error("invalid repository name '{0}', expected owner/repo")]
    InvalidRepository(String),

    /// The pull request number is invalid.
    #[error("invalid pull request number {0}, expected a positive integer")]
    InvalidPullRequestNumber(u64),

    /// The pull request URL could not be parsed.
    #[error("unrecognised pull request URL: {0}")]
    InvalidPullRequestUrl(String),

    /// The agent identifier is empty or malformed.
    #[error("invalid agent identifier '{0}'")]
    InvalidAgentId(String),

    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// A dependency does not exist.
    #[error("dependency {0} does not exist")]
    UnknownDependency(TaskId),

    /// A dependency lives outside the new task's group.
    #[error("dependency {dependency} is not in group {group_id:?}")]
    DependencyOutsideGroup {
        /// Group of the new task.
        group_id: Option<GroupId>,
        /// Offending dependency.
        dependency: TaskId,
    },

    /// A dependency graph was built from tasks of more than one group.
    #[error("task {task_id} belongs to group {found:?}, expected {expected:?}")]
    MixedGroups {
        /// Group of the first task supplied.
        expected: Option<GroupId>,
        /// Group of the offending task.
        found: Option<GroupId>,
        /// Offending task.
        task_id: TaskId,
    },

    /// The task is driven interactively and excluded from the engine.
    #[error("task {0} is terminal-sourced and not managed by the lifecycle engine")]
    InteractiveTask(TaskId),

    /// The requested transition is not permitted from the current status.
    #[error("task {task_id} cannot {operation} while {from}")]
    InvalidTransition {
        /// Task identifier.
        task_id: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// The task is awaiting review and must be approved or rejected instead.
    #[error("task {0} is awaiting review; approve or reject it instead")]
    ReviewPending(TaskId),
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

/// Error returned while parsing task sources from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task source: {0}")]
pub struct ParseTaskSourceError(pub String);
