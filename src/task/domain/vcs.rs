//! Version-control value objects carried by tasks.
//!
//! The engine never interprets repository or branch fields; it only needs to
//! recognise a pull request well enough to ask the VCS client to merge it.

use super::{RepositoryFullName, TaskDomainError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported VCS hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VcsHost {
    /// GitHub pull requests.
    #[serde(rename = "github")]
    GitHub,
    /// GitLab merge requests.
    #[serde(rename = "gitlab")]
    GitLab,
}

impl VcsHost {
    /// Returns the host name in canonical storage format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
        }
    }
}

impl TryFrom<&str> for VcsHost {
    type Error = TaskDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "github" => Ok(Self::GitHub),
            "gitlab" => Ok(Self::GitLab),
            _ => Err(TaskDomainError::InvalidVcsHost(value.to_owned())),
        }
    }
}

impl fmt::Display for VcsHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Positive pull request number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PullRequestNumber(u64);

impl PullRequestNumber {
    /// Creates a validated pull request number.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidPullRequestNumber`] when the value
    /// is zero.
    pub const fn new(value: u64) -> Result<Self, TaskDomainError> {
        if value == 0 {
            return Err(TaskDomainError::InvalidPullRequestNumber(value));
        }
        Ok(Self(value))
    }

    /// Returns the underlying numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PullRequestNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pull request reference scoped to a VCS host and repository.
///
/// # Examples
///
///     use drover::task::domain::PullRequestRef;
///
///     let pr = PullRequestRef::parse_url("https://github.com/owner/repo/pull/42")
///         .expect("valid PR URL");
///     assert_eq!(pr.to_string(), "github:owner/repo:42");
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PullRequestRef {
    host: VcsHost,
    repository: RepositoryFullName,
    number: PullRequestNumber,
}

impl PullRequestRef {
    /// Creates a pull request reference from validated components.
    #[must_use]
    pub const fn new(
        host: VcsHost,
        repository: RepositoryFullName,
        number: PullRequestNumber,
    ) -> Self {
        Self {
            host,
            repository,
            number,
        }
    }

    /// Creates a pull request reference from raw values.
    ///
    /// # Errors
    ///
    /// Returns a [`TaskDomainError`] when any component is invalid.
    pub fn from_parts(host: &str, repository: &str, number: u64) -> Result<Self, TaskDomainError> {
        Ok(Self::new(
            VcsHost::try_from(host)?,
            RepositoryFullName::new(repository)?,
            PullRequestNumber::new(number)?,
        ))
    }

    /// Parses a GitHub pull request or GitLab merge request web URL.
    ///
    /// Accepted shapes are `https://github.com/owner/repo/pull/42` and
    /// `https://gitlab.com/owner/repo/-/merge_requests/42`; trailing path
    /// segments such as `/files` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidPullRequestUrl`] when the URL does
    /// not match either shape.
    pub fn parse_url(url: &str) -> Result<Self, TaskDomainError> {
        let invalid = || TaskDomainError::InvalidPullRequestUrl(url.to_owned());
        let trimmed = url.trim();
        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .ok_or_else(invalid)?;
        let (authority, path) = without_scheme.split_once('/').ok_or_else(invalid)?;
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let (host, owner, repo, number) = match (host_for(authority), segments.as_slice()) {
            (Some(VcsHost::GitHub), [owner, repo, "pull", number, ..]) => {
                (VcsHost::GitHub, *owner, *repo, *number)
            }
            (Some(VcsHost::GitLab), [owner, repo, "-", "merge_requests", number, ..]) => {
                (VcsHost::GitLab, *owner, *repo, *number)
            }
            _ => return Err(invalid()),
        };

        let parsed_number: u64 = number.parse().map_err(|_| invalid())?;
        let repository =
            RepositoryFullName::new(format!("{owner}/{repo}")).map_err(|_| invalid())?;
        let pr_number = PullRequestNumber::new(parsed_number).map_err(|_| invalid())?;
        Ok(Self::new(host, repository, pr_number))
    }

    /// Returns the VCS host.
    #[must_use]
    pub const fn host(&self) -> VcsHost {
        self.host
    }

    /// Returns the repository identifier.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryFullName {
        &self.repository
    }

    /// Returns the pull request number.
    #[must_use]
    pub const fn number(&self) -> PullRequestNumber {
        self.number
    }
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.host, self.repository, self.number)
    }
}

fn host_for(authority: &str) -> Option<VcsHost> {
    let host = authority.to_ascii_lowercase();
    if host == "github.com" || host.ends_with(".github.com") {
        Some(VcsHost::GitHub)
    } else if host == "gitlab.com" || host.starts_with("gitlab.") {
        Some(VcsHost::GitLab)
    } else {
        None
    }
}

/// Repository and branch coordinates of a task.
///
/// These values are written by the API layer and the worker; the engine only
/// stores them and fills in `pr_url` when a review approval creates one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VcsFields {
    /// Clone URL of the repository the task works on.
    pub repo_url: Option<String>,
    /// Branch the work starts from.
    pub base_branch: Option<String>,
    /// Branch the worker pushes to.
    pub work_branch: Option<String>,
    /// Web URL of the pull request opened for the work branch.
    pub pr_url: Option<String>,
}
