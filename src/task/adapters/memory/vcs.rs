//! In-memory VCS provider for local runs and integration tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use crate::task::{
    domain::{PullRequestRef, Task, TaskId},
    ports::{VcsClient, VcsClientError, VcsClientResult},
};

/// VCS provider that opens numbered pull requests in memory and records
/// merges.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVcsClient {
    state: Arc<RwLock<VcsState>>,
}

#[derive(Debug, Default)]
struct VcsState {
    last_number: u64,
    opened: HashMap<TaskId, String>,
    merged: Vec<PullRequestRef>,
    merge_rejection: Option<String>,
}

impl InMemoryVcsClient {
    /// Creates a provider with no pull requests.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent merge fail with `reason`.
    #[must_use]
    pub fn rejecting_merges(self, reason: impl Into<String>) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.merge_rejection = Some(reason.into());
        }
        self
    }

    /// Returns the pull requests merged so far, oldest first.
    #[must_use]
    pub fn merged(&self) -> Vec<PullRequestRef> {
        self.state
            .read()
            .map(|state| state.merged.clone())
            .unwrap_or_default()
    }

    /// Returns how many pull requests have been opened.
    #[must_use]
    pub fn opened_count(&self) -> usize {
        self.state
            .read()
            .map(|state| state.opened.len())
            .unwrap_or_default()
    }

    fn write(&self) -> VcsClientResult<RwLockWriteGuard<'_, VcsState>> {
        self.state
            .write()
            .map_err(|err| VcsClientError::remote(std::io::Error::other(err.to_string())))
    }
}

fn pull_request_url(repo_url: &str, number: u64) -> String {
    let base = repo_url.trim_end_matches('/').trim_end_matches(".git");
    if base.contains("gitlab") {
        format!("{base}/-/merge_requests/{number}")
    } else {
        format!("{base}/pull/{number}")
    }
}

#[async_trait]
impl VcsClient for InMemoryVcsClient {
    async fn create_or_find_pull_request(&self, task: &Task) -> VcsClientResult<String> {
        let repo_url = task
            .vcs()
            .repo_url
            .as_deref()
            .ok_or_else(|| VcsClientError::MissingCoordinates("repo_url".to_owned()))?;
        if task.vcs().work_branch.is_none() {
            return Err(VcsClientError::MissingCoordinates("work_branch".to_owned()));
        }

        let mut state = self.write()?;
        if let Some(existing) = state.opened.get(&task.id()) {
            return Ok(existing.clone());
        }
        state.last_number = state.last_number.saturating_add(1);
        let url = pull_request_url(repo_url, state.last_number);
        state.opened.insert(task.id(), url.clone());
        Ok(url)
    }

    async fn merge_pull_request(&self, pull_request: &PullRequestRef) -> VcsClientResult<()> {
        let mut state = self.write()?;
        if let Some(reason) = state.merge_rejection.clone() {
            return Err(VcsClientError::MergeRejected {
                pull_request: pull_request.clone(),
                reason,
            });
        }
        state.merged.push(pull_request.clone());
        Ok(())
    }

    fn parse_pull_request_url(&self, url: &str) -> VcsClientResult<PullRequestRef> {
        PullRequestRef::parse_url(url)
            .map_err(|_| VcsClientError::InvalidPullRequestUrl(url.to_owned()))
    }
}
