//! When steps for restart-from BDD scenarios.

use super::world::{RestartWorld, run_async};
use rstest_bdd_macros::when;

fn restart(
    world: &mut RestartWorld,
    origin: &str,
    feedback: Option<String>,
) -> Result<(), eyre::Report> {
    let from_task_id = world.task_id(origin)?;
    let result = run_async(
        world
            .service
            .restart_from(world.group_id, from_task_id, feedback),
    );
    world.last_restart = Some(result);
    Ok(())
}

#[when(r#"the group is restarted from "{origin}" with feedback "{feedback}""#)]
fn restart_with_feedback(
    world: &mut RestartWorld,
    origin: String,
    feedback: String,
) -> Result<(), eyre::Report> {
    restart(world, &origin, Some(feedback))
}

#[when(r#"the group is restarted from "{origin}" without feedback"#)]
fn restart_without_feedback(world: &mut RestartWorld, origin: String) -> Result<(), eyre::Report> {
    restart(world, &origin, None)
}
