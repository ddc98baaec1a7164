//! Worker capability and telemetry metadata.

use crate::task::domain::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Authentication state a worker reports for one agent CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    /// The agent CLI is logged in.
    Authenticated,
    /// The agent CLI is installed but not logged in.
    Unauthenticated,
    /// The worker could not tell.
    #[default]
    Unknown,
}

/// What a worker can run.
///
/// Capabilities are stored as JSON so new fields can be added without
/// database migrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCapabilities {
    supported_agents: BTreeSet<AgentId>,
    environment: BTreeSet<String>,
    auth_status: BTreeMap<AgentId, AuthStatus>,
    max_concurrent_tasks: u32,
}

impl Default for WorkerCapabilities {
    fn default() -> Self {
        Self::new(1)
    }
}

impl WorkerCapabilities {
    /// Creates capabilities with a concurrency budget and no agents.
    #[must_use]
    pub const fn new(max_concurrent_tasks: u32) -> Self {
        Self {
            supported_agents: BTreeSet::new(),
            environment: BTreeSet::new(),
            auth_status: BTreeMap::new(),
            max_concurrent_tasks,
        }
    }

    /// Sets the agent CLIs the worker can run.
    #[must_use]
    pub fn with_agents(mut self, agents: impl IntoIterator<Item = AgentId>) -> Self {
        self.supported_agents = agents.into_iter().collect();
        self
    }

    /// Sets the names of environment variables the worker reported.
    #[must_use]
    pub fn with_environment(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.environment = names.into_iter().collect();
        self
    }

    /// Records the authentication state of one agent CLI.
    #[must_use]
    pub fn with_auth_status(mut self, agent: AgentId, status: AuthStatus) -> Self {
        self.auth_status.insert(agent, status);
        self
    }

    /// Replaces the concurrency budget.
    #[must_use]
    pub const fn with_max_concurrent_tasks(mut self, max_concurrent_tasks: u32) -> Self {
        self.max_concurrent_tasks = max_concurrent_tasks;
        self
    }

        /// Returns whether the worker can run tasks for `agent`.
    #[must_use]
    pub fn supports(&self, agent: &AgentId) -> bool {
        self.supported_agents.contains(agent)
    }

    /// Returns the supported agent CLIs.
    #[must_use]
    pub const fn supported_agents(&self) -> &BTreeSet<AgentId> {
        &self.supported_agents
    }

    /// Returns the reported environment variable names.
    #[must_use]
    pub const fn environment(&self) -> &BTreeSet<String> {
        &self.environment
    }

    /// Returns the reported authentication state per agent.
    #[must_use]
    pub const fn auth_status(&self) -> &BTreeMap<AgentId, AuthStatus> {
        &self.auth_status
    }

    /// Returns how many tasks the worker may hold at once.
    #[must_use]
    pub const fn max_concurrent_tasks(&self) -> u32 {
        self.max_concurrent_tasks
    }
}

/// Resource usage a worker reports with each heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkerTelemetry {
    /// CPU utilisation, whole percent.
    pub cpu_percent: Option<u8>,
    /// Resident memory in use, mebibytes.
    pub memory_used_mb: Option<u64>,
    /// Total memory, mebibytes.
    pub memory_total_mb: Option<u64>,
    /// Free disk space on the work volume, mebibytes.
    pub disk_free_mb: Option<u64>,
}
