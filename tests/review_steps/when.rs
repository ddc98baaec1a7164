//! When steps for review BDD scenarios.

use super::world::{ReviewWorld, run_async};
use drover::task::services::ApproveRequest;
use rstest_bdd_macros::when;

#[when(r#"the reviewer rejects it with "{notes}""#)]
fn reviewer_rejects(world: &mut ReviewWorld, notes: String) -> Result<(), eyre::Report> {
    let task_id = world.task_id()?;
    world.last_result = Some(run_async(world.service.reject(task_id, notes)));
    Ok(())
}

#[when("the reviewer approves it with merge")]
fn reviewer_approves_with_merge(world: &mut ReviewWorld) -> Result<(), eyre::Report> {
    let task_id = world.task_id()?;
    world.last_result = Some(run_async(
        world
            .service
            .approve(task_id, ApproveRequest::new().with_merge()),
    ));
    Ok(())
}
