//! When steps for worker heartbeat BDD scenarios.

use super::world::{HeartbeatWorld, run_async};
use drover::task::domain::TaskId;
use drover::worker::domain::{HeartbeatReport, WorkerId, WorkerStatus};
use rstest_bdd_macros::when;

fn parse_status(status: &str) -> Result<WorkerStatus, eyre::Report> {
    WorkerStatus::try_from(status).map_err(|err| eyre::eyre!("invalid status in scenario: {err}"))
}

fn report(
    world: &mut HeartbeatWorld,
    worker_id: WorkerId,
    status: WorkerStatus,
    task_id: Option<TaskId>,
) {
    let result = run_async(
        world
            .heartbeat
            .apply(&HeartbeatReport::new(worker_id, status, task_id)),
    );
    world.last_heartbeat = Some(result);
}

#[when(r#"the worker reports "{status}" on task "{label}""#)]
fn worker_reports_task(
    world: &mut HeartbeatWorld,
    status: String,
    label: String,
) -> Result<(), eyre::Report> {
    let worker_id = world.worker_id()?;
    let task_id = world.task_id(label);
    report(world, worker_id, parse_status(&status)?, Some(task_id));
    Ok(())
}

#[when(r#"the worker reports "{status}" without a task"#)]
fn worker_reports_no_task(world: &mut HeartbeatWorld, status: String) -> Result<(), eyre::Report> {
    let worker_id = world.worker_id()?;
    report(world, worker_id, parse_status(&status)?, None);
    Ok(())
}

#[when(r#"an unregistered worker reports "{status}""#)]
fn unregistered_worker_reports(
    world: &mut HeartbeatWorld,
    status: String,
) -> Result<(), eyre::Report> {
    report(world, WorkerId::new(), parse_status(&status)?, None);
    Ok(())
}
