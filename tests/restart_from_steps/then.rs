//! Then steps for restart-from BDD scenarios.

use super::world::{RestartWorld, run_async};
use drover::task::{
    domain::{Task, TaskStatus},
    ports::TaskRepository,
    services::{RestartFromReport, TaskLifecycleError},
};
use rstest_bdd_macros::then;

fn stored(world: &RestartWorld, label: &str) -> Result<Task, eyre::Report> {
    let task_id = world.task_id(label)?;
    run_async(world.repository.find_by_id(task_id))?
        .ok_or_else(|| eyre::eyre!("task {label} missing from repository"))
}

fn report(world: &RestartWorld) -> Result<&RestartFromReport, eyre::Report> {
    match world.last_restart.as_ref() {
        Some(Ok(report)) => Ok(report),
        Some(Err(err)) => Err(eyre::eyre!("restart failed unexpectedly: {err}")),
        None => Err(eyre::eyre!("missing restart result")),
    }
}

#[then(r#"the restart is refused naming "{label}""#)]
fn restart_refused(world: &RestartWorld, label: String) -> Result<(), eyre::Report> {
    let expected = world.task_id(&label)?;
    let result = world
        .last_restart
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing restart result"))?;

    match result {
        Err(TaskLifecycleError::RunningInClosure { task_ids, .. }) if task_ids == &[expected] => {
            Ok(())
        }
        other => Err(eyre::eyre!(
            "expected RunningInClosure naming {label}, got {other:?}"
        )),
    }
}

#[then("the restart reports the origin as queued")]
fn origin_queued(world: &RestartWorld) -> Result<(), eyre::Report> {
    if !report(world)?.from_task_queued {
        return Err(eyre::eyre!("expected the origin to be queued"));
    }
    Ok(())
}

#[then(r#"the restart reports "{label}" as outstanding"#)]
fn dependency_outstanding(world: &RestartWorld, label: String) -> Result<(), eyre::Report> {
    let expected = world.task_id(&label)?;
    let restart = report(world)?;
    if restart.outstanding_dependencies != vec![expected] || restart.from_task_queued {
        return Err(eyre::eyre!(
            "expected {label} outstanding and origin waiting, got {restart:?}"
        ));
    }
    Ok(())
}

#[then(r#"task "{label}" is "{status}""#)]
fn task_status_is(world: &RestartWorld, label: String, status: String) -> Result<(), eyre::Report> {
    let expected = TaskStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    let task = stored(world, &label)?;
    if task.status() != expected {
        return Err(eyre::eyre!(
            "expected task {label} to be {expected}, found {}",
            task.status()
        ));
    }
    Ok(())
}

#[then(r#"task "{label}" has feedback "{feedback}""#)]
fn task_has_feedback(
    world: &RestartWorld,
    label: String,
    feedback: String,
) -> Result<(), eyre::Report> {
    let task = stored(world, &label)?;
    if task.feedback() != Some(feedback.as_str()) {
        return Err(eyre::eyre!(
            "expected feedback {feedback:?} on {label}, found {:?}",
            task.feedback()
        ));
    }
    Ok(())
}

#[then(r#"task "{label}" has no feedback"#)]
fn task_has_no_feedback(world: &RestartWorld, label: String) -> Result<(), eyre::Report> {
    let task = stored(world, &label)?;
    if let Some(feedback) = task.feedback() {
        return Err(eyre::eyre!("expected no feedback on {label}, found {feedback:?}"));
    }
    Ok(())
}
