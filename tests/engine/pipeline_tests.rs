//! End-to-end pipeline flows across lifecycle, scheduler, and heartbeats.

use super::helpers::{Engine, engine};
use drover::events::EventType;
use drover::task::{
    domain::{GroupId, TaskStatus, VcsFields},
    services::{ApproveRequest, NewTaskRequest, TaskLifecycleError},
};
use drover::worker::domain::WorkerStatus;
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dependent_task_runs_after_its_dependency_is_approved(
    engine: Engine,
) -> Result<(), eyre::Report> {
    let group = GroupId::new();
    let worker = engine.register_worker(&["claude"]).await?;
    let first = engine
        .lifecycle
        .create(NewTaskRequest::new("Write parser", "prompt", "claude").with_group(group))
        .await?;
    let second = engine
        .lifecycle
        .create(
            NewTaskRequest::new("Write tests", "prompt", "claude")
                .with_group(group)
                .with_dependencies([first.id()]),
        )
        .await?;

    let first_tick = engine.tick().await?;
    eyre::ensure!(first_tick.promoted == vec![first.id()], "only the root is promoted");
    eyre::ensure!(first_tick.assigned.len() == 1, "the root is assigned");
    eyre::ensure!(
        engine.task(second.id()).await?.status() == TaskStatus::Waiting,
        "dependent keeps waiting"
    );

    engine.lifecycle.mark_finished(first.id()).await?;
    engine
        .report(worker.id(), WorkerStatus::Idle, None)
        .await?;
    let idle_report = engine.tick().await?;
    eyre::ensure!(idle_report.is_noop(), "nothing is ready while review is pending");

    engine
        .lifecycle
        .approve(first.id(), ApproveRequest::new().with_comment("good"))
        .await?;
    let final_tick = engine.tick().await?;

    eyre::ensure!(final_tick.promoted == vec![second.id()], "dependent is promoted");
    let running = engine.task(second.id()).await?;
    eyre::ensure!(running.status() == TaskStatus::Running, "dependent runs");
    eyre::ensure!(
        running.assigned_worker_id() == Some(worker.id()),
        "dependent runs on the idle worker"
    );
    eyre::ensure!(
        engine.worker(worker.id()).await?.current_task_id() == Some(second.id()),
        "worker references the dependent"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejections_requeue_until_the_ceiling_then_fail(
    engine: Engine,
) -> Result<(), eyre::Report> {
    let worker = engine.register_worker(&["claude"]).await?;
    let task = engine
        .lifecycle
        .create(NewTaskRequest::new("Fix bug", "prompt", "claude").with_max_retries(1))
        .await?;

    engine.tick().await?;
    engine.lifecycle.mark_finished(task.id()).await?;
    let requeued = engine.lifecycle.reject(task.id(), "missing test").await?;
    eyre::ensure!(requeued.status() == TaskStatus::Queued, "first rejection requeues");
    eyre::ensure!(requeued.feedback() == Some("missing test"), "notes become feedback");

    engine
        .report(worker.id(), WorkerStatus::Idle, None)
        .await?;
    let report = engine.tick().await?;
    eyre::ensure!(report.assigned.len() == 1, "requeued task is reassigned");
    engine.lifecycle.mark_finished(task.id()).await?;
    let failed = engine.lifecycle.reject(task.id(), "still missing").await?;

    eyre::ensure!(failed.status() == TaskStatus::Failed, "second rejection fails");
    eyre::ensure!(failed.retry().retry_count() == 2, "both rejections counted");
    eyre::ensure!(
        engine.events.events_of(EventType::TaskFailed).len() == 1,
        "exhaustion is reported once"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn restart_after_failure_replays_the_downstream_chain(
    engine: Engine,
) -> Result<(), eyre::Report> {
    let group = GroupId::new();
    let worker = engine.register_worker(&["claude"]).await?;
    let first = engine
        .lifecycle
        .create(NewTaskRequest::new("Plan", "prompt", "claude").with_group(group))
        .await?;
    let second = engine
        .lifecycle
        .create(
            NewTaskRequest::new("Build", "prompt", "claude")
                .with_group(group)
                .with_dependencies([first.id()]),
        )
        .await?;
    engine.tick().await?;
    engine.lifecycle.mark_failed(first.id(), "agent crashed").await?;
    engine
        .report(worker.id(), WorkerStatus::Idle, None)
        .await?;

    let restart = engine
        .lifecycle
        .restart_from(group, first.id(), Some("use the cached plan".to_owned()))
        .await?;

    eyre::ensure!(restart.from_task_queued, "origin is queued");
    eyre::ensure!(
        restart.updated.len() == 2
            && restart.updated.contains(&first.id())
            && restart.updated.contains(&second.id()),
        "origin and dependent were reset"
    );
    eyre::ensure!(
        engine.task(second.id()).await?.status() == TaskStatus::Waiting,
        "dependent waits for the origin"
    );
    let report = engine.tick().await?;
    eyre::ensure!(
        report.assigned.first().map(|assignment| assignment.task_id) == Some(first.id()),
        "origin runs again"
    );
    let replayed = engine.task(first.id()).await?;
    eyre::ensure!(replayed.retry().retry_count() == 1, "restart consumed a retry");
    eyre::ensure!(replayed.feedback() == Some("use the cached plan"), "feedback applied");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn approval_with_merge_binds_and_merges_pull_request(
    engine: Engine,
) -> Result<(), eyre::Report> {
    engine.register_worker(&["claude"]).await?;
    let task = engine
        .lifecycle
        .create(NewTaskRequest::new("Ship it", "prompt", "claude").with_vcs(VcsFields {
            repo_url: Some("https://github.com/acme/widgets.git".to_owned()),
            base_branch: Some("main".to_owned()),
            work_branch: Some("drover/ship".to_owned()),
            pr_url: None,
        }))
        .await?;
    engine.tick().await?;
    engine.lifecycle.mark_finished(task.id()).await?;

    let approved = engine
        .lifecycle
        .approve(task.id(), ApproveRequest::new().with_merge())
        .await?;

    eyre::ensure!(approved.status() == TaskStatus::Completed, "task completes");
    eyre::ensure!(
        approved.vcs().pr_url.as_deref() == Some("https://github.com/acme/widgets/pull/1"),
        "pull request is bound"
    );
    eyre::ensure!(engine.vcs.merged().len() == 1, "pull request is merged");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn approval_without_coordinates_leaves_task_in_review(
    engine: Engine,
) -> Result<(), eyre::Report> {
    engine.register_worker(&["claude"]).await?;
    let task = engine
        .lifecycle
        .create(NewTaskRequest::new("No repo", "prompt", "claude"))
        .await?;
    engine.tick().await?;
    engine.lifecycle.mark_finished(task.id()).await?;

    let result = engine
        .lifecycle
        .approve(task.id(), ApproveRequest::new().with_merge())
        .await;

    eyre::ensure!(
        matches!(result, Err(TaskLifecycleError::Vcs(_))),
        "missing coordinates surface as a VCS error, got {result:?}"
    );
    eyre::ensure!(
        engine.task(task.id()).await?.status() == TaskStatus::AwaitingReview,
        "task stays in review"
    );
    Ok(())
}
