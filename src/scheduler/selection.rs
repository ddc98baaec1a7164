//! Worker selection for queued tasks.

use crate::task::domain::{AgentId, Task};
use crate::worker::domain::{Worker, WorkerId, WorkerStatus};
use std::collections::HashMap;

/// Running-task counts per worker.
pub type WorkerLoad = HashMap<WorkerId, u32>;

/// Counts running tasks per bound worker.
#[must_use]
pub fn running_load<'a>(running: impl IntoIterator<Item = &'a Task>) -> WorkerLoad {
    let mut load = WorkerLoad::new();
    for worker_id in running.into_iter().filter_map(Task::assigned_worker_id) {
        let count = load.entry(worker_id).or_insert(0);
        *count = count.saturating_add(1);
    }
    load
}

/// Returns whether `worker` may take a task for `agent`.
#[must_use]
pub fn is_eligible(worker: &Worker, agent: &AgentId, load: &WorkerLoad) -> bool {
    let current = load.get(&worker.id()).copied().unwrap_or(0);
    worker.status() == WorkerStatus::Idle
        && worker.capabilities().supports(agent)
        && current < worker.capabilities().max_concurrent_tasks()
}

/// Picks the position of the best eligible worker in `candidates`.
///
/// Prefers the least-loaded worker, then the one whose last heartbeat is
/// oldest (workers that never reported come first), then the lowest id.
#[must_use]
pub fn select_worker(candidates: &[Worker], agent: &AgentId, load: &WorkerLoad) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, worker)| is_eligible(worker, agent, load))
        .min_by_key(|(_, worker)| {
            (
                load.get(&worker.id()).copied().unwrap_or(0),
                worker.last_heartbeat_at(),
                worker.id(),
            )
        })
        .map(|(position, _)| position)
}
