//! Dependency graph resolution for pipeline replay.

use super::{GroupId, Task, TaskDomainError, TaskId, TaskStatus};
use std::collections::{HashMap, HashSet, VecDeque};

/// Snapshot of one group's dependency relation.
///
/// The graph is built from tasks as they were read, so statuses reflect that
/// read and may already be stale when acted upon. Acyclicity is assumed but
/// never required: traversal is guarded by a visited set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    group_id: Option<GroupId>,
    depends_on: HashMap<TaskId, Vec<TaskId>>,
    dependents: HashMap<TaskId, Vec<TaskId>>,
    statuses: HashMap<TaskId, TaskStatus>,
}

impl DependencyGraph {
    /// Builds the dependents map (the inverse of `depends_on`) for a group.
    ///
    /// Dependencies on tasks outside the supplied set are kept in
    /// `depends_on` but contribute no dependents entry.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::MixedGroups`] when the tasks do not all
    /// share one group.
    pub fn from_tasks<'a, I>(tasks: I) -> Result<Self, TaskDomainError>
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let mut graph = Self {
            group_id: None,
            depends_on: HashMap::new(),
            dependents: HashMap::new(),
            statuses: HashMap::new(),
        };
        let mut group: Option<Option<GroupId>> = None;

        for task in tasks {
            match group {
                None => group = Some(task.group_id()),
                Some(expected) if expected != task.group_id() => {
                    return Err(TaskDomainError::MixedGroups {
                        expected,
                        found: task.group_id(),
                        task_id: task.id(),
                    });
                }
                Some(_) => {}
            }
            graph.statuses.insert(task.id(), task.status());
            graph
                .depends_on
                .insert(task.id(), task.depends_on().to_vec());
        }
        graph.group_id = group.flatten();

        for (task_id, dependencies) in &graph.depends_on {
            for dependency in dependencies {
                if graph.statuses.contains_key(dependency) {
                    graph
                        .dependents
                        .entry(*dependency)
                        .or_default()
                        .push(*task_id);
                }
            }
        }
        Ok(graph)
    }

    /// Returns the group the graph was built for.
    #[must_use]
    pub const fn group_id(&self) -> Option<GroupId> {
        self.group_id
    }

    /// Returns whether the task is part of the graph.
    #[must_use]
    pub fn contains(&self, task_id: TaskId) -> bool {
        self.statuses.contains_key(&task_id)
    }

    /// Returns the status the task had when the graph was built.
    #[must_use]
    pub fn status_of(&self, task_id: TaskId) -> Option<TaskStatus> {
        self.statuses.get(&task_id).copied()
    }

    /// Returns the tasks that directly depend on `task_id`.
    #[must_use]
    pub fn dependents_of(&self, task_id: TaskId) -> &[TaskId] {
        self.dependents.get(&task_id).map_or(&[], Vec::as_slice)
    }

    /// Computes the downstream closure of `from`: the task itself plus every
    /// task that transitively depends on it.
    ///
    /// The result always contains `from`, even when it is not in the graph.
    #[must_use]
    pub fn downstream_closure(&self, from: TaskId) -> HashSet<TaskId> {
        let mut visited = HashSet::from([from]);
        let mut pending = VecDeque::from([from]);

        while let Some(current) = pending.pop_front() {
            for dependent in self.dependents_of(current) {
                if visited.insert(*dependent) {
                    pending.push_back(*dependent);
                }
            }
        }
        visited
    }

    /// Returns the dependencies of `task_id` that were not `completed` when
    /// the graph was built, in declaration order.
    ///
    /// A dependency missing from the graph counts as outstanding.
    #[must_use]
    pub fn outstanding_dependencies(&self, task_id: TaskId) -> Vec<TaskId> {
        self.depends_on
            .get(&task_id)
            .map(|dependencies| {
                dependencies
                    .iter()
                    .filter(|dependency| {
                        self.status_of(**dependency) != Some(TaskStatus::Completed)
                    })
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }
}
