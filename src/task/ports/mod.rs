//! Port contracts for the task lifecycle.
//!
//! Ports define infrastructure-agnostic interfaces used by task services.

pub mod repository;
pub mod vcs;

pub use repository::{TaskRepository, TaskRepositoryError, TaskRepositoryResult};
pub use vcs::{VcsClient, VcsClientError, VcsClientResult};
