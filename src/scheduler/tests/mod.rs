//! Unit tests for scheduler ticks and worker selection.

use crate::events::{EventType, adapters::InMemoryEventEmitter};
use crate::scheduler::{
    Assignment, Scheduler, SchedulerState, TickOutcome, TickReport, WorkerLoad, running_load,
    select_worker,
};
use crate::store::WriteOutcome;
use crate::task::{
    adapters::memory::InMemoryTaskRepository,
    domain::{
        AgentId, GroupId, PersistedTaskData, RetryWindow, Task, TaskId, TaskSource, TaskStatus,
        VcsFields,
    },
    ports::{TaskRepository, TaskRepositoryResult},
};
use crate::worker::{
    adapters::memory::InMemoryWorkerRepository,
    domain::{
        HeartbeatReport, Worker, WorkerCapabilities, WorkerId, WorkerMode, WorkerStatus,
        WorkerTelemetry,
    },
    ports::{WorkerRepository, WorkerRepositoryResult},
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

fn agent(name: &str) -> AgentId {
    AgentId::new(name).expect("valid agent")
}

fn task(
    status: TaskStatus,
    agent_name: &str,
    group_id: Option<GroupId>,
    depends_on: Vec<TaskId>,
    age_secs: i64,
) -> Task {
    let created_at = Utc::now() - Duration::seconds(age_secs);
    let queued_at = (status == TaskStatus::Queued).then_some(created_at);
    Task::from_persisted(PersistedTaskData {
        id: TaskId::new(),
        group_id,
        title: "scheduled task".to_owned(),
        prompt: "Do the work".to_owned(),
        agent: agent(agent_name),
        status,
        source: TaskSource::Scheduler,
        depends_on,
        retry: RetryWindow::with_max_retries(2),
        feedback: None,
        review_comment: None,
        error_message: None,
        requires_review: true,
        assigned_worker_id: None,
        vcs: VcsFields::default(),
        queued_at,
        started_at: None,
        completed_at: None,
        reviewed_at: None,
        created_at,
        updated_at: created_at,
    })
}

fn worker_for(agents: &[&str], max_concurrent_tasks: u32) -> Worker {
    Worker::new(
        "runner",
        WorkerMode::Daemon,
        WorkerCapabilities::new(max_concurrent_tasks)
            .with_agents(agents.iter().copied().map(agent)),
        &DefaultClock,
    )
    .expect("valid worker")
}

struct Harness<T: TaskRepository> {
    scheduler: Scheduler<T, InMemoryWorkerRepository, InMemoryEventEmitter, DefaultClock>,
    tasks: InMemoryTaskRepository,
    workers: InMemoryWorkerRepository,
    events: InMemoryEventEmitter,
}

fn harness_over<T: TaskRepository>(task_port: T, tasks: InMemoryTaskRepository) -> Harness<T> {
    let workers = InMemoryWorkerRepository::new();
    let events = InMemoryEventEmitter::new();
    let scheduler = Scheduler::new(
        Arc::new(task_port),
        Arc::new(workers.clone()),
        Arc::new(events.clone()),
        Arc::new(DefaultClock),
        Arc::new(SchedulerState::new()),
    );
    Harness {
        scheduler,
        tasks,
        workers,
        events,
    }
}

#[fixture]
fn harness() -> Harness<InMemoryTaskRepository> {
    let tasks = InMemoryTaskRepository::new();
    harness_over(tasks.clone(), tasks)
}

impl<T: TaskRepository> Harness<T> {
    async fn seed_tasks(&self, seeded: &[&Task]) {
        for item in seeded {
            self.tasks.store(item).await.expect("store succeeds");
        }
    }

    async fn seed_worker(&self, worker: &Worker) {
        self.workers.store(worker).await.expect("store succeeds");
    }

    async fn task(&self, id: TaskId) -> Task {
        self.tasks
            .find_by_id(id)
            .await
            .expect("lookup succeeds")
            .expect("task exists")
    }

    async fn worker(&self, worker: &Worker) -> Worker {
        self.workers
            .find_by_id(worker.id())
            .await
            .expect("lookup succeeds")
            .expect("worker exists")
    }

    async fn tick(&self) -> TickReport {
        match self.scheduler.tick().await.expect("tick succeeds") {
            TickOutcome::Completed(report) => report,
            TickOutcome::AlreadyRunning => panic!("no other tick should be running"),
        }
    }
}

/// Task repository that reports its next `remaining` writes from `queued`
/// as lost races.
struct QueuedRace {
    inner: InMemoryTaskRepository,
    remaining: AtomicU32,
}

#[async_trait]
impl TaskRepository for QueuedRace {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        self.inner.store(task).await
    }

    async fn update_if_status(
        &self,
        task: &Task,
        expected: TaskStatus,
    ) -> TaskRepositoryResult<WriteOutcome> {
        if expected == TaskStatus::Queued
            && self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
        {
            return Ok(WriteOutcome::Stale);
        }
        self.inner.update_if_status(task, expected).await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        self.inner.find_by_id(id).await
    }

    async fn list_by_group(&self, group_id: GroupId) -> TaskRepositoryResult<Vec<Task>> {
        self.inner.list_by_group(group_id).await
    }

    async fn list_by_status(&self, status: TaskStatus) -> TaskRepositoryResult<Vec<Task>> {
        self.inner.list_by_status(status).await
    }

    async fn delete(&self, id: TaskId) -> TaskRepositoryResult<()> {
        self.inner.delete(id).await
    }
}

/// When a heartbeat lands relative to the scheduler's claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeartbeatMoment {
    AfterListing,
    BeforeClaim,
}

/// Worker repository that stores one heartbeat at a chosen moment of a
/// tick, as a worker reporting in concurrently would.
struct HeartbeatDuringTick {
    inner: InMemoryWorkerRepository,
    report: HeartbeatReport,
    moment: HeartbeatMoment,
    pending: AtomicBool,
}

impl HeartbeatDuringTick {
    async fn land_if(&self, moment: HeartbeatMoment) -> WorkerRepositoryResult<()> {
        if moment != self.moment || !self.pending.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(mut stored) = self.inner.find_by_id(self.report.worker_id).await? {
            let before = stored.status();
            stored.apply_heartbeat(&self.report, &DefaultClock);
            self.inner.update_if_status(&stored, before).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl WorkerRepository for HeartbeatDuringTick {
    async fn store(&self, worker: &Worker) -> WorkerRepositoryResult<()> {
        self.inner.store(worker).await
    }

    async fn update_if_status(
        &self,
        worker: &Worker,
        expected: WorkerStatus,
    ) -> WorkerRepositoryResult<WriteOutcome> {
        self.inner.update_if_status(worker, expected).await
    }

    async fn update_assignment_if_status(
        &self,
        worker: &Worker,
        expected: WorkerStatus,
    ) -> WorkerRepositoryResult<WriteOutcome> {
        self.land_if(HeartbeatMoment::BeforeClaim).await?;
        self.inner.update_assignment_if_status(worker, expected).await
    }

    async fn find_by_id(&self, id: WorkerId) -> WorkerRepositoryResult<Option<Worker>> {
        self.inner.find_by_id(id).await
    }

    async fn list_all(&self) -> WorkerRepositoryResult<Vec<Worker>> {
        self.inner.list_all().await
    }

    async fn list_by_status(&self, status: WorkerStatus) -> WorkerRepositoryResult<Vec<Worker>> {
        let listed = self.inner.list_by_status(status).await?;
        self.land_if(HeartbeatMoment::AfterListing).await?;
        Ok(listed)
    }

    async fn delete(&self, id: WorkerId) -> WorkerRepositoryResult<()> {
        self.inner.delete(id).await
    }
}

async fn tick_with_heartbeat(
    queued: &Task,
    runner: &Worker,
    report: HeartbeatReport,
    moment: HeartbeatMoment,
) -> (TickReport, InMemoryTaskRepository, InMemoryWorkerRepository) {
    let tasks = InMemoryTaskRepository::new();
    let workers = InMemoryWorkerRepository::new();
    tasks.store(queued).await.expect("store succeeds");
    workers.store(runner).await.expect("store succeeds");
    let scheduler = Scheduler::new(
        Arc::new(tasks.clone()),
        Arc::new(HeartbeatDuringTick {
            inner: workers.clone(),
            report,
            moment,
            pending: AtomicBool::new(true),
        }),
        Arc::new(InMemoryEventEmitter::new()),
        Arc::new(DefaultClock),
        Arc::new(SchedulerState::new()),
    );
    match scheduler.tick().await.expect("tick succeeds") {
        TickOutcome::Completed(report) => (report, tasks, workers),
        TickOutcome::AlreadyRunning => panic!("no other tick should be running"),
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn claim_keeps_heartbeat_stored_just_before_it() {
    let queued = task(TaskStatus::Queued, "claude", None, Vec::new(), 10);
    let runner = worker_for(&["claude"], 1);
    let telemetry = WorkerTelemetry {
        cpu_percent: Some(12),
        ..WorkerTelemetry::default()
    };
    let heartbeat = HeartbeatReport::new(runner.id(), WorkerStatus::Idle, None)
        .with_telemetry(telemetry)
        .with_capabilities(WorkerCapabilities::new(2).with_agents([agent("claude")]));

    let (report, _, workers) =
        tick_with_heartbeat(&queued, &runner, heartbeat, HeartbeatMoment::BeforeClaim).await;

    assert_eq!(report.assigned.len(), 1);
    let stored = workers
        .find_by_id(runner.id())
        .await
        .expect("lookup succeeds")
        .expect("worker exists");
    assert_eq!(stored.status(), WorkerStatus::Busy);
    assert_eq!(stored.current_task_id(), Some(queued.id()));
    assert!(stored.last_heartbeat_at().is_some());
    assert_eq!(stored.telemetry(), telemetry);
    assert_eq!(stored.capabilities().max_concurrent_tasks(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn worker_dropping_the_agent_mid_tick_is_not_claimed() {
    let queued = task(TaskStatus::Queued, "claude", None, Vec::new(), 10);
    let runner = worker_for(&["claude"], 1);
    let heartbeat = HeartbeatReport::new(runner.id(), WorkerStatus::Idle, None)
        .with_capabilities(WorkerCapabilities::new(1).with_agents([agent("codex")]));

    let (report, tasks, workers) =
        tick_with_heartbeat(&queued, &runner, heartbeat, HeartbeatMoment::AfterListing).await;

    assert!(report.assigned.is_empty());
    assert_eq!(report.unassigned, vec![queued.id()]);
    let task_after = tasks
        .find_by_id(queued.id())
        .await
        .expect("lookup succeeds")
        .expect("task exists");
    assert_eq!(task_after.status(), TaskStatus::Queued);
    assert_eq!(task_after.assigned_worker_id(), None);
    let stored = workers
        .find_by_id(runner.id())
        .await
        .expect("lookup succeeds")
        .expect("worker exists");
    assert_eq!(stored.status(), WorkerStatus::Idle);
    assert!(stored.capabilities().supports(&agent("codex")));
    assert!(stored.last_heartbeat_at().is_some());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tick_promotes_tasks_whose_dependencies_completed(
    harness: Harness<InMemoryTaskRepository>,
) {
    let group = GroupId::new();
    let done = task(TaskStatus::Completed, "claude", Some(group), Vec::new(), 30);
    let pending = task(TaskStatus::Failed, "claude", Some(group), Vec::new(), 25);
    let ready = task(TaskStatus::Waiting, "claude", Some(group), vec![done.id()], 20);
    let blocked = task(
        TaskStatus::Waiting,
        "claude",
        Some(group),
        vec![done.id(), pending.id()],
        10,
    );
    let root = task(TaskStatus::Waiting, "claude", None, Vec::new(), 5);
    harness.seed_tasks(&[&done, &pending, &ready, &blocked, &root]).await;

    let report = harness.tick().await;

    assert_eq!(report.promoted, vec![ready.id(), root.id()]);
    assert_eq!(harness.task(ready.id()).await.status(), TaskStatus::Queued);
    assert!(harness.task(ready.id()).await.queued_at().is_some());
    assert_eq!(harness.task(blocked.id()).await.status(), TaskStatus::Waiting);
    assert_eq!(harness.events.events_of(EventType::TaskPromoted).len(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tick_binds_queued_task_to_idle_worker(harness: Harness<InMemoryTaskRepository>) {
    let queued = task(TaskStatus::Queued, "claude", None, Vec::new(), 10);
    let runner = worker_for(&["claude"], 1);
    harness.seed_tasks(&[&queued]).await;
    harness.seed_worker(&runner).await;

    let report = harness.tick().await;

    assert_eq!(
        report.assigned,
        vec![Assignment {
            task_id: queued.id(),
            worker_id: runner.id(),
        }]
    );
    let bound = harness.task(queued.id()).await;
    assert_eq!(bound.status(), TaskStatus::Running);
    assert_eq!(bound.assigned_worker_id(), Some(runner.id()));
    let busy = harness.worker(&runner).await;
    assert_eq!(busy.status(), WorkerStatus::Busy);
    assert_eq!(busy.current_task_id(), Some(queued.id()));
    assert_eq!(harness.events.events_of(EventType::TaskAssigned).len(), 1);
    assert!(harness.scheduler.state().last_tick_at().is_some());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_tick_without_changes_writes_nothing(harness: Harness<InMemoryTaskRepository>) {
    let queued = task(TaskStatus::Queued, "claude", None, Vec::new(), 20);
    let waiting = task(TaskStatus::Waiting, "codex", None, Vec::new(), 10);
    let runner = worker_for(&["claude"], 1);
    harness.seed_tasks(&[&queued, &waiting]).await;
    harness.seed_worker(&runner).await;
    harness.tick().await;
    let tasks_after_first = harness
        .tasks
        .list_by_status(TaskStatus::Queued)
        .await
        .expect("listing succeeds");
    let events_after_first = harness.events.events().len();

    let report = harness.tick().await;

    assert!(report.is_noop());
    assert_eq!(report.unassigned, vec![waiting.id()]);
    assert_eq!(
        harness
            .tasks
            .list_by_status(TaskStatus::Queued)
            .await
            .expect("listing succeeds"),
        tasks_after_first
    );
    assert_eq!(harness.events.events().len(), events_after_first);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn overlapping_tick_returns_without_work(harness: Harness<InMemoryTaskRepository>) {
    let queued = task(TaskStatus::Queued, "claude", None, Vec::new(), 10);
    harness.seed_tasks(&[&queued]).await;
    harness.seed_worker(&worker_for(&["claude"], 1)).await;
    let guard = harness
        .scheduler
        .state()
        .try_begin()
        .expect("no tick running yet");

    let outcome = harness.scheduler.tick().await.expect("tick succeeds");

    assert_eq!(outcome, TickOutcome::AlreadyRunning);
    assert_eq!(harness.task(queued.id()).await.status(), TaskStatus::Queued);
    drop(guard);
    assert!(!harness.scheduler.state().is_in_flight());
    assert!(harness.scheduler.state().last_tick_at().is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn oldest_queued_task_wins_the_only_worker(harness: Harness<InMemoryTaskRepository>) {
    let newer = task(TaskStatus::Queued, "claude", None, Vec::new(), 10);
    let older = task(TaskStatus::Queued, "claude", None, Vec::new(), 60);
    let runner = worker_for(&["claude"], 1);
    harness.seed_tasks(&[&newer, &older]).await;
    harness.seed_worker(&runner).await;

    let report = harness.tick().await;

    assert_eq!(report.assigned.len(), 1);
    assert_eq!(report.assigned[0].task_id, older.id());
    assert_eq!(report.unassigned, vec![newer.id()]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tasks_are_only_bound_to_workers_supporting_their_agent(
    harness: Harness<InMemoryTaskRepository>,
) {
    let for_codex = task(TaskStatus::Queued, "codex", None, Vec::new(), 20);
    let for_claude = task(TaskStatus::Queued, "claude", None, Vec::new(), 10);
    let runner = worker_for(&["claude"], 1);
    harness.seed_tasks(&[&for_codex, &for_claude]).await;
    harness.seed_worker(&runner).await;

    let report = harness.tick().await;

    assert_eq!(report.unassigned, vec![for_codex.id()]);
    assert_eq!(report.assigned[0].task_id, for_claude.id());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn non_idle_workers_and_terminal_tasks_are_left_alone(
    harness: Harness<InMemoryTaskRepository>,
) {
    let interactive = {
        let mut data = persisted(&task(TaskStatus::Queued, "claude", None, Vec::new(), 20));
        data.source = TaskSource::Terminal;
        Task::from_persisted(data)
    };
    let queued = task(TaskStatus::Queued, "claude", None, Vec::new(), 10);
    let mut draining = worker_for(&["claude"], 1);
    draining.drain(&DefaultClock).expect("idle worker drains");
    harness.seed_tasks(&[&interactive, &queued]).await;
    harness.seed_worker(&draining).await;

    let report = harness.tick().await;

    assert!(report.assigned.is_empty());
    assert_eq!(report.unassigned, vec![queued.id()]);
    assert_eq!(harness.task(interactive.id()).await.status(), TaskStatus::Queued);
    assert_eq!(harness.worker(&draining).await.status(), WorkerStatus::Draining);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn lost_task_race_returns_worker_to_idle() {
    let tasks = InMemoryTaskRepository::new();
    let racing = QueuedRace {
        inner: tasks.clone(),
        remaining: AtomicU32::new(1),
    };
    let harness = harness_over(racing, tasks);
    let first = task(TaskStatus::Queued, "claude", None, Vec::new(), 20);
    let second = task(TaskStatus::Queued, "claude", None, Vec::new(), 10);
    let runner = worker_for(&["claude"], 1);
    harness.seed_tasks(&[&first, &second]).await;
    harness.seed_worker(&runner).await;

    let report = harness.tick().await;

    assert_eq!(harness.task(first.id()).await.status(), TaskStatus::Queued);
    assert_eq!(
        report.assigned,
        vec![Assignment {
            task_id: second.id(),
            worker_id: runner.id(),
        }]
    );
    assert_eq!(report.unassigned, vec![first.id()]);
    let stored = harness.worker(&runner).await;
    assert_eq!(stored.status(), WorkerStatus::Busy);
    assert_eq!(stored.current_task_id(), Some(second.id()));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn zero_interval_loop_still_ticks_and_stops(harness: Harness<InMemoryTaskRepository>) {
    let queued = task(TaskStatus::Queued, "claude", None, Vec::new(), 10);
    harness.seed_tasks(&[&queued]).await;
    harness.seed_worker(&worker_for(&["claude"], 1)).await;
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let stop = async {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        shutdown_tx.send(true).expect("loop is listening");
    };
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        tokio::join!(
            harness
                .scheduler
                .run_until(std::time::Duration::ZERO, shutdown_rx),
            stop
        )
    })
    .await
    .expect("loop stops on shutdown");

    assert_eq!(harness.task(queued.id()).await.status(), TaskStatus::Running);
    assert!(harness.scheduler.state().last_tick_at().is_some());
}

#[rstest]
fn selection_prefers_least_loaded_then_stalest_heartbeat() {
    let claude = agent("claude");
    let loaded = worker_for(&["claude"], 3);
    let mut recent = worker_for(&["claude"], 1);
    let silent = worker_for(&["claude"], 1);
    let unsupported = worker_for(&["codex"], 1);
    recent.apply_heartbeat(
        &HeartbeatReport::new(recent.id(), WorkerStatus::Idle, None),
        &DefaultClock,
    );
    let mut load = WorkerLoad::new();
    load.insert(loaded.id(), 1);
    let candidates = vec![unsupported, loaded, recent, silent];

    assert_eq!(select_worker(&candidates, &claude, &load), Some(3));
    assert_eq!(select_worker(&candidates[..3], &claude, &load), Some(2));
    assert_eq!(select_worker(&candidates[..2], &claude, &load), Some(1));
    assert_eq!(select_worker(&candidates[..1], &claude, &load), None);
}

#[rstest]
fn workers_at_capacity_are_not_eligible() {
    let claude = agent("claude");
    let full = worker_for(&["claude"], 2);
    let mut running = Vec::new();
    for _ in 0..2 {
        let mut bound = task(TaskStatus::Queued, "claude", None, Vec::new(), 0);
        bound
            .start(full.id(), &DefaultClock)
            .expect("queued task starts");
        running.push(bound);
    }
    let load = running_load(&running);

    assert_eq!(load.get(&full.id()), Some(&2));
    assert_eq!(select_worker(&[full], &claude, &load), None);
}

fn persisted(source: &Task) -> PersistedTaskData {
    PersistedTaskData {
        id: source.id(),
        group_id: source.group_id(),
        title: source.title().to_owned(),
        prompt: source.prompt().to_owned(),
        agent: source.agent().clone(),
        status: source.status(),
        source: source.source(),
        depends_on: source.depends_on().to_vec(),
        retry: source.retry(),
        feedback: source.feedback().map(str::to_owned),
        review_comment: source.review_comment().map(str::to_owned),
        error_message: source.error_message().map(str::to_owned),
        requires_review: source.requires_review(),
        assigned_worker_id: source.assigned_worker_id(),
        vcs: source.vcs().clone(),
        queued_at: source.queued_at(),
        started_at: source.started_at(),
        completed_at: source.completed_at(),
        reviewed_at: source.reviewed_at(),
        created_at: source.created_at(),
        updated_at: source.updated_at(),
    }
}
