//! Given steps for review BDD scenarios.

use super::world::{ReviewWorld, awaiting_review, run_async};
use drover::task::{
    domain::{RetryWindow, Task, VcsFields},
    ports::TaskRepository,
};
use eyre::WrapErr;
use rstest_bdd_macros::given;

fn seed(world: &mut ReviewWorld, task: &Task) -> Result<(), eyre::Report> {
    run_async(world.repository.store(task)).wrap_err("seed task under review")?;
    world.task_id = Some(task.id());
    Ok(())
}

#[given("a task awaiting review with {used:u32} of {ceiling:u32} retries used")]
fn task_with_retries(world: &mut ReviewWorld, used: u32, ceiling: u32) -> Result<(), eyre::Report> {
    let task = awaiting_review(RetryWindow::new(used, ceiling), VcsFields::default())?;
    seed(world, &task)
}

#[given(r#"a task awaiting review on "{repo_url}" branch "{work_branch}""#)]
fn task_with_coordinates(
    world: &mut ReviewWorld,
    repo_url: String,
    work_branch: String,
) -> Result<(), eyre::Report> {
    let task = awaiting_review(
        RetryWindow::with_max_retries(2),
        VcsFields {
            repo_url: Some(repo_url),
            base_branch: Some("main".to_owned()),
            work_branch: Some(work_branch),
            pr_url: None,
        },
    )?;
    seed(world, &task)
}

#[given("the provider refuses merges")]
fn provider_refuses_merges(world: &mut ReviewWorld) {
    world.vcs = world.vcs.clone().rejecting_merges("branch protection");
}
