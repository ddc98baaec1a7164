//! VCS provider client port used when approving reviewed work.

use crate::task::domain::{PullRequestRef, Task};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for VCS client operations.
pub type VcsClientResult<T> = Result<T, VcsClientError>;

/// Remote VCS operations the review flow depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VcsClient: Send + Sync {
    /// Opens a pull request for the task's work branch, or returns the one
    /// already open for it. Returns the pull request web URL.
    async fn create_or_find_pull_request(&self, task: &Task) -> VcsClientResult<String>;

    /// Merges a pull request.
    async fn merge_pull_request(&self, pull_request: &PullRequestRef) -> VcsClientResult<()>;

    /// Parses a pull request web URL into a reference.
    ///
    /// # Errors
    ///
    /// Returns [`VcsClientError::InvalidPullRequestUrl`] for URLs the
    /// provider does not recognise.
    fn parse_pull_request_url(&self, url: &str) -> VcsClientResult<PullRequestRef>;
}

/// Errors returned by VCS client adapters.
#[derive(Debug, Clone, Error)]
pub enum VcsClientError {
    /// The URL is not a pull request URL this provider understands.
    #[error("unrecognised pull request URL: {0}")]
    InvalidPullRequestUrl(String),

    /// The task lacks the repository or branch data needed to open a pull
    /// request.
    #[error("task is missing VCS coordinates: {0}")]
    MissingCoordinates(String),

    /// The provider refused the merge.
    #[error("merge of {pull_request} rejected: {reason}")]
    MergeRejected {
        /// Pull request that was not merged.
        pull_request: PullRequestRef,
        /// Provider-supplied reason.
        reason: String,
    },

    /// Transport or provider failure.
    #[error("VCS provider error: {0}")]
    Remote(Arc<dyn std::error::Error + Send + Sync>),
}

impl VcsClientError {
    /// Wraps a transport or provider error.
    pub fn remote(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Remote(Arc::new(err))
    }
}
