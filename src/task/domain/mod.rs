//! Domain model for the task lifecycle.
//!
//! The task domain owns the status state machine, the retry policy, and the
//! dependency graph used for pipeline replay. All infrastructure concerns
//! live outside the domain boundary.

mod error;
mod graph;
mod ids;
mod retry;
mod status;
mod task;
mod vcs;

pub use error::{ParseTaskSourceError, ParseTaskStatusError, TaskDomainError};
pub use graph::DependencyGraph;
pub use ids::{AgentId, GroupId, RepositoryFullName, TaskId};
pub use retry::{RetryWindow, compute_retry_window};
pub use status::{TaskSource, TaskStatus};
pub use task::{PersistedTaskData, RejectionOutcome, ReplayTarget, Task, TaskDraft};
pub use vcs::{PullRequestNumber, PullRequestRef, VcsFields, VcsHost};
