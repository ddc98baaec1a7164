//! Given steps for restart-from BDD scenarios.

use super::world::{RestartWorld, run_async};
use drover::task::{
    domain::{TaskId, TaskStatus},
    ports::TaskRepository,
};
use eyre::WrapErr;
use rstest_bdd_macros::given;

fn parse_status(status: &str) -> Result<TaskStatus, eyre::Report> {
    TaskStatus::try_from(status).map_err(|err| eyre::eyre!("invalid status in scenario: {err}"))
}

fn seed(
    world: &mut RestartWorld,
    label: String,
    status: &str,
    depends_on: Vec<TaskId>,
) -> Result<(), eyre::Report> {
    let task = world.seeded_task(&label, parse_status(status)?, depends_on)?;
    run_async(world.repository.store(&task)).wrap_err("seed group task")?;
    world.labels.insert(label, task.id());
    Ok(())
}

#[given(r#"a root task "{label}" that is "{status}""#)]
fn root_task(world: &mut RestartWorld, label: String, status: String) -> Result<(), eyre::Report> {
    seed(world, label, &status, Vec::new())
}

#[given(r#"a task "{label}" after "{dependency}" that is "{status}""#)]
fn dependent_task(
    world: &mut RestartWorld,
    label: String,
    dependency: String,
    status: String,
) -> Result<(), eyre::Report> {
    let dependency_id = world.task_id(&dependency)?;
    seed(world, label, &status, vec![dependency_id])
}
