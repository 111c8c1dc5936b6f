//! Task orchestrator: task table, ready set, control loop, and dispatch.
//!
//! All scheduling state sits behind one `parking_lot::Mutex` owned by the
//! scheduler. The control loop takes it for a whole tick; workers take it
//! only for completion bookkeeping, so state transitions are serialized. Lock
//! order is scheduler state, then ledger, then audit sink. Event handlers
//! always run after every lock is released.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::builders::build_ledger;
use crate::config::SchedulerConfig;
use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::dependency::{DependencyTracker, Readiness};
use crate::core::error::SchedulerError;
use crate::core::events::{EventBus, EventKind, TaskEvent};
use crate::core::executor::{ExecutionError, TaskContext};
use crate::core::ledger::ResourceLedger;
use crate::core::policy::{build_policy, SchedulingPolicy};
use crate::core::ready_queue::ReadyQueue;
use crate::core::stats::{SchedulerStats, TaskSummary, RECENT_TASKS};
use crate::core::task::{Task, TaskSnapshot, TaskState};
use crate::core::worker::{self, Dispatch};
use crate::runtime::{Spawn, TokioSpawner};
use crate::util::clock::{now_ms, seconds_between};
use crate::util::serde::TaskId;

/// Poll step used by [`TaskScheduler::wait_for`] and
/// [`TaskScheduler::wait_idle`].
const WAIT_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    submitted: u64,
    completed: u64,
    failed: u64,
    cancelled: u64,
    retried: u64,
    completion_secs: f64,
}

struct SchedulerState {
    tasks: HashMap<TaskId, Task>,
    ready: ReadyQueue,
    /// Tasks holding a worker slot, with the token that interrupts them.
    running: HashMap<TaskId, CancellationToken>,
    dependencies: DependencyTracker,
    completed: Vec<TaskId>,
    failed: Vec<TaskId>,
    cancelled: Vec<TaskId>,
    policy: Box<dyn SchedulingPolicy>,
    counters: Counters,
    next_seq: u64,
    started_at_ms: Option<u128>,
}

struct Shared {
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    ledger: Arc<ResourceLedger>,
    events: EventBus,
    audit: Mutex<Option<Box<dyn AuditSink>>>,
    workers: Arc<Semaphore>,
    wake: Notify,
}

impl Shared {
    fn audit(&self, task: &Task, action: AuditAction, detail: Option<String>) {
        if let Some(sink) = self.audit.lock().as_mut() {
            sink.record(build_audit_event(task.id(), task.name(), action, detail));
        }
    }

    fn emit(&self, events: &[TaskEvent]) {
        for event in events {
            self.events.emit(event);
        }
    }

    fn enqueue_promoted(&self, st: &mut SchedulerState, promoted: Vec<TaskId>) {
        for id in promoted {
            if let Some(task) = st.tasks.get(&id) {
                self.audit(task, AuditAction::Ready, None);
            }
            st.ready.push_back(id);
        }
    }

    fn promote(&self, st: &mut SchedulerState) {
        let promoted = st.dependencies.promote(&mut st.tasks);
        self.enqueue_promoted(st, promoted);
    }

    fn cancel_locked(
        &self,
        st: &mut SchedulerState,
        id: TaskId,
    ) -> Result<TaskEvent, SchedulerError> {
        let task = st.tasks.get_mut(&id).ok_or(SchedulerError::NotFound(id))?;
        let previous = task.state();
        task.mark_cancelled()?;
        info!(task_id = %id, task = task.name(), from = %previous, "task cancelled");
        self.audit(task, AuditAction::Cancel, Some(format!("was {previous}")));
        let event = TaskEvent::from_task(EventKind::Cancelled, task);

        if previous == TaskState::Running {
            // The worker keeps its slot and reservation until it returns.
            if let Some(token) = st.running.get(&id) {
                token.cancel();
            }
        } else {
            st.ready.remove(id);
            st.dependencies.forget(id);
            st.policy.forget(id);
        }
        st.cancelled.push(id);
        st.counters.cancelled += 1;
        Ok(event)
    }

    /// One scheduling pass: promote, dispatch while slots and ready tasks
    /// remain, promote again, then handle orphans.
    fn tick<S: Spawn>(self: &Arc<Self>, spawner: &S) {
        let mut dispatches = Vec::new();
        let mut events = Vec::new();
        {
            let mut guard = self.state.lock();
            let st = &mut *guard;
            self.promote(st);

            // Tasks whose resources are short stay queued in place and are
            // skipped for the rest of this tick.
            let mut deferred: HashSet<TaskId> = HashSet::new();
            while st.ready.len() > deferred.len() {
                let Ok(permit) = Arc::clone(&self.workers).try_acquire_owned() else {
                    break;
                };

                let decision_started = Instant::now();
                let selected = {
                    let ready: Vec<&Task> = st
                        .ready
                        .iter()
                        .filter(|id| !deferred.contains(id))
                        .filter_map(|id| st.tasks.get(&id))
                        .collect();
                    st.policy.select_next(&ready, now_ms())
                };
                let latency = decision_started.elapsed();
                let Some(id) = selected else {
                    break;
                };
                let Some(task) = st.tasks.get_mut(&id) else {
                    st.ready.remove(id);
                    continue;
                };

                if self.config.enable_resource_management && !task.resources_required().is_empty() {
                    match self.ledger.allocate_first_fit(id, task.resources_required()) {
                        Ok(reserved) => debug!(task_id = %id, ?reserved, "resources reserved"),
                        Err(e) => {
                            if e.is_transient() {
                                debug!(
                                    task_id = %id,
                                    reason = %e,
                                    "resources unavailable, task stays ready"
                                );
                            } else {
                                error!(
                                    task_id = %id,
                                    error = %e,
                                    "resource allocation failed, task stays ready"
                                );
                            }
                            deferred.insert(id);
                            continue;
                        }
                    }
                }
                st.ready.remove(id);

                if let Err(e) = task.mark_running() {
                    error!(task_id = %id, error = %e, "cannot start selected task");
                    self.ledger.deallocate(id);
                    continue;
                }
                st.policy.record_decision(latency);

                let cancel = CancellationToken::new();
                let ctx = TaskContext {
                    task_id: id,
                    name: task.name().to_string(),
                    priority: task.priority(),
                    attempt: task.retry_count(),
                    estimated_duration: task.estimated_duration(),
                    cancel: cancel.clone(),
                };
                let min_duration = self
                    .config
                    .enforce_min_duration
                    .then(|| task.estimated_duration());
                info!(
                    task_id = %id,
                    task = task.name(),
                    attempt = task.retry_count(),
                    "task started"
                );
                self.audit(task, AuditAction::Start, None);
                events.push(TaskEvent::from_task(EventKind::Started, task));
                dispatches.push(Dispatch {
                    ctx,
                    work: task.work(),
                    permit,
                    min_duration,
                });
                st.running.insert(id, cancel);
            }

            self.promote(st);

            if self.config.cascade_cancel_orphans {
                for id in st.dependencies.orphans(&st.tasks) {
                    match self.cancel_locked(st, id) {
                        Ok(event) => {
                            warn!(
                                task_id = %id,
                                "cancelled task whose dependency can never complete"
                            );
                            events.push(event);
                        }
                        Err(e) => {
                            warn!(task_id = %id, error = %e, "failed to cancel orphaned task");
                        }
                    }
                }
            }
        }

        self.emit(&events);
        for dispatch in dispatches {
            self.spawn_worker(spawner, dispatch);
        }
    }

    fn spawn_worker<S: Spawn>(self: &Arc<Self>, spawner: &S, dispatch: Dispatch) {
        let shared = Arc::clone(self);
        spawner.spawn(async move {
            let id = dispatch.task_id();
            let Dispatch {
                ctx,
                work,
                permit,
                min_duration,
            } = dispatch;
            let result = worker::execute(ctx, work, min_duration).await;
            shared.finish(id, result);
            drop(permit);
            shared.wake.notify_one();
        });
    }

    /// Completion bookkeeping for a worker that returned.
    fn finish(&self, id: TaskId, result: Result<(), ExecutionError>) {
        let mut events = Vec::new();
        {
            let mut guard = self.state.lock();
            let st = &mut *guard;
            st.running.remove(&id);
            self.ledger.deallocate(id);

            let Some(task) = st.tasks.get_mut(&id) else {
                warn!(task_id = %id, "worker finished for unknown task");
                return;
            };
            if task.state() != TaskState::Running {
                debug!(
                    task_id = %id,
                    state = %task.state(),
                    succeeded = result.is_ok(),
                    "discarding outcome of task that is no longer running"
                );
                st.policy.forget(id);
                return;
            }

            match result {
                Ok(()) => {
                    if let Err(e) = task.mark_completed() {
                        error!(task_id = %id, error = %e, "cannot complete task");
                        return;
                    }
                    let elapsed = task.execution_time().unwrap_or_default();
                    st.counters.completed += 1;
                    st.counters.completion_secs += elapsed;
                    info!(
                        task_id = %id,
                        task = task.name(),
                        elapsed_secs = elapsed,
                        "task completed"
                    );
                    self.audit(task, AuditAction::Complete, None);
                    events.push(TaskEvent::from_task(EventKind::Completed, task));
                    st.completed.push(id);
                    st.policy.forget(id);

                    let promoted = st.dependencies.on_completed(id, &mut st.tasks);
                    self.enqueue_promoted(st, promoted);
                }
                Err(err) => {
                    if let Err(e) = task.mark_failed(err.0.clone()) {
                        error!(task_id = %id, error = %e, "cannot fail task");
                        return;
                    }
                    st.counters.failed += 1;
                    error!(
                        task_id = %id,
                        task = task.name(),
                        attempt = task.retry_count(),
                        error = %err,
                        "task failed"
                    );
                    self.audit(task, AuditAction::Fail, Some(err.0));
                    events.push(TaskEvent::from_task(EventKind::Failed, task));

                    if self.config.auto_retry && task.can_retry() {
                        match task.retry() {
                            Ok(()) => {
                                self.audit(task, AuditAction::Retry, None);
                                st.counters.retried += 1;
                                st.ready.push_back(id);
                            }
                            Err(e) => warn!(task_id = %id, error = %e, "automatic retry refused"),
                        }
                    } else {
                        st.failed.push(id);
                        st.policy.forget(id);
                    }
                }
            }
        }
        self.emit(&events);
    }
}

async fn control_loop<S: Spawn>(shared: Arc<Shared>, spawner: S, shutdown: CancellationToken) {
    let poll = shared.config.poll_interval();
    loop {
        shared.tick(&spawner);
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = shared.wake.notified() => {}
            () = tokio::time::sleep(poll) => {}
        }
    }
    debug!("control loop stopped");
}

/// Policy-driven task scheduler with dependency tracking and a resource
/// ledger.
///
/// ```rust,ignore
/// use prometheus_task_scheduler::config::SchedulerConfig;
/// use prometheus_task_scheduler::core::{Resource, Task, TaskScheduler};
/// use prometheus_task_scheduler::util::serde::ResourceKind;
///
/// let scheduler = TaskScheduler::new(SchedulerConfig::default())?;
/// scheduler.ledger().add_resource(Resource::new("cpu-0", "CPU", ResourceKind::Cpu, 4)?)?;
/// let setup = scheduler.submit(Task::simulated("setup").with_estimated_duration(0.5))?;
/// scheduler.submit(
///     Task::simulated("process")
///         .with_dependency(setup)
///         .requires(ResourceKind::Cpu),
/// )?;
/// scheduler.start()?;
/// ```
pub struct TaskScheduler<S = TokioSpawner> {
    shared: Arc<Shared>,
    spawner: S,
    shutdown: Mutex<Option<CancellationToken>>,
}

impl TaskScheduler<TokioSpawner> {
    /// Create a scheduler that spawns onto the ambient tokio runtime.
    ///
    /// # Errors
    ///
    /// `Config` if the configuration is invalid, or a ledger error if a
    /// configured resource cannot be registered.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::with_spawner(config, TokioSpawner::default())
    }
}

impl<S> TaskScheduler<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a scheduler that spawns its control loop and workers through
    /// `spawner`. Configured pools and resources are registered up front.
    ///
    /// # Errors
    ///
    /// `Config` if the configuration is invalid, or a ledger error if a
    /// configured resource cannot be registered.
    pub fn with_spawner(config: SchedulerConfig, spawner: S) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::Config)?;
        let ledger = Arc::new(build_ledger(&config)?);
        let state = SchedulerState {
            tasks: HashMap::new(),
            ready: ReadyQueue::new(),
            running: HashMap::new(),
            dependencies: DependencyTracker::new(),
            completed: Vec::new(),
            failed: Vec::new(),
            cancelled: Vec::new(),
            policy: build_policy(&config.policy),
            counters: Counters::default(),
            next_seq: 0,
            started_at_ms: None,
        };
        Ok(Self {
            shared: Arc::new(Shared {
                workers: Arc::new(Semaphore::new(config.max_concurrent_tasks)),
                config,
                state: Mutex::new(state),
                ledger,
                events: EventBus::new(),
                audit: Mutex::new(None),
                wake: Notify::new(),
            }),
            spawner,
            shutdown: Mutex::new(None),
        })
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(self, sink: Box<dyn AuditSink>) -> Self {
        self.set_audit_sink(sink);
        self
    }

    /// Replace the audit sink.
    pub fn set_audit_sink(&self, sink: Box<dyn AuditSink>) {
        *self.shared.audit.lock() = Some(sink);
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Resource ledger, for administration and reporting.
    #[must_use]
    pub fn ledger(&self) -> &Arc<ResourceLedger> {
        &self.shared.ledger
    }

    /// Accept a `Pending` task. It becomes `Ready` if every dependency has
    /// completed, `Blocked` otherwise.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed task, an unknown dependency, a task that
    /// is not `Pending`, or an identifier that was already submitted.
    pub fn submit(&self, mut task: Task) -> Result<TaskId, SchedulerError> {
        task.validate()?;
        let id = task.id();
        if task.state() != TaskState::Pending {
            return Err(SchedulerError::Validation(format!(
                "task `{}` must be pending to be submitted, is {}",
                task.name(),
                task.state()
            )));
        }
        {
            let mut guard = self.shared.state.lock();
            let st = &mut *guard;
            if st.tasks.contains_key(&id) {
                return Err(SchedulerError::Validation(format!("task {id} was already submitted")));
            }
            DependencyTracker::validate(&task, &st.tasks)?;

            st.next_seq += 1;
            task.set_seq(st.next_seq);
            let readiness = DependencyTracker::classify(&task, &st.tasks);
            match readiness {
                Readiness::Ready => task.mark_ready()?,
                Readiness::Blocked => task.mark_blocked()?,
            }
            self.shared.audit(&task, AuditAction::Submit, None);
            match readiness {
                Readiness::Ready => {
                    self.shared.audit(&task, AuditAction::Ready, None);
                    st.ready.push_back(id);
                }
                Readiness::Blocked => {
                    self.shared.audit(&task, AuditAction::Blocked, None);
                    st.dependencies.track(&task);
                }
            }
            info!(
                task_id = %id,
                task = task.name(),
                priority = %task.priority(),
                state = %task.state(),
                "task submitted"
            );
            st.counters.submitted += 1;
            st.tasks.insert(id, task);
        }
        self.shared.wake.notify_one();
        Ok(id)
    }

    /// Cancel a task. Waiting tasks are cancelled on the spot; a running task
    /// is marked `Cancelled` and its worker is signalled, and whatever the
    /// worker returns afterwards is discarded.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `IllegalTransition` if the task already finished.
    pub fn cancel(&self, id: TaskId) -> Result<(), SchedulerError> {
        let event = {
            let mut guard = self.shared.state.lock();
            self.shared.cancel_locked(&mut guard, id)?
        };
        self.shared.events.emit(&event);
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Put a failed task back into the ready set.
    ///
    /// # Errors
    ///
    /// `NotFound`, `RetryExhausted`, or `IllegalTransition` if the task is not
    /// `Failed`.
    pub fn retry(&self, id: TaskId) -> Result<(), SchedulerError> {
        {
            let mut guard = self.shared.state.lock();
            let st = &mut *guard;
            let task = st.tasks.get_mut(&id).ok_or(SchedulerError::NotFound(id))?;
            task.retry()?;
            self.shared.audit(task, AuditAction::Retry, None);
            st.failed.retain(|failed| *failed != id);
            st.counters.retried += 1;
            st.ready.push_back(id);
        }
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Current state of a task.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    pub fn status(&self, id: TaskId) -> Result<TaskState, SchedulerError> {
        self.shared
            .state
            .lock()
            .tasks
            .get(&id)
            .map(Task::state)
            .ok_or(SchedulerError::NotFound(id))
    }

    /// Snapshot of a task.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.shared.state.lock().tasks.get(&id).map(TaskSnapshot::from)
    }

    /// Start the control loop. Calling it again while running does nothing.
    ///
    /// # Errors
    ///
    /// `Runtime` if the spawner has no runtime to run on.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut shutdown = self.shutdown.lock();
        if shutdown.is_some() {
            debug!("scheduler already running");
            return Ok(());
        }
        if !self.spawner.is_available() {
            return Err(SchedulerError::Runtime(
                "no async runtime available to host the control loop".into(),
            ));
        }
        self.shared.state.lock().started_at_ms.get_or_insert_with(now_ms);

        let token = CancellationToken::new();
        self.spawner.spawn(control_loop(
            Arc::clone(&self.shared),
            self.spawner.clone(),
            token.clone(),
        ));
        *shutdown = Some(token);
        info!(
            policy = self.shared.config.policy.name(),
            max_concurrent_tasks = self.shared.config.max_concurrent_tasks,
            "scheduler started"
        );
        Ok(())
    }

    /// Stop the control loop. Running workers finish and are booked as
    /// usual; nothing new is dispatched. Calling it again does nothing.
    pub fn stop(&self) {
        if let Some(token) = self.shutdown.lock().take() {
            token.cancel();
            info!("scheduler stopped");
        }
    }

    /// Whether the control loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shutdown.lock().is_some()
    }

    /// Register an event handler. Handlers run outside the scheduler's locks;
    /// a panicking handler is logged and ignored.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&TaskEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(kind, Arc::new(handler));
    }

    /// Aggregate counters and component statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> SchedulerStats {
        let is_running = self.is_running();
        let st = self.shared.state.lock();
        let average_completion_time_secs = if st.counters.completed == 0 {
            0.0
        } else {
            st.counters.completion_secs / st.counters.completed as f64
        };
        SchedulerStats {
            total_submitted: st.counters.submitted,
            total_completed: st.counters.completed,
            total_failed: st.counters.failed,
            total_cancelled: st.counters.cancelled,
            total_retried: st.counters.retried,
            average_completion_time_secs,
            ready_tasks: st.ready.len(),
            running_tasks: st.running.len(),
            blocked_tasks: st.dependencies.blocked().len(),
            is_running,
            max_concurrent_tasks: self.shared.config.max_concurrent_tasks,
            policy: st.policy.stats(),
            resources: self.shared.ledger.stats(),
            started_at_ms: st.started_at_ms,
            uptime_secs: st
                .started_at_ms
                .map_or(0.0, |started| seconds_between(started, now_ms()).max(0.0)),
        }
    }

    /// Tasks grouped by state and priority, overdue tasks, and the most
    /// recently created ones.
    #[must_use]
    pub fn summary(&self) -> TaskSummary {
        let st = self.shared.state.lock();
        let mut by_state: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_priority: BTreeMap<String, usize> = BTreeMap::new();
        let mut overdue = Vec::new();
        for task in st.tasks.values() {
            *by_state.entry(task.state().to_string()).or_default() += 1;
            *by_priority.entry(task.priority().to_string()).or_default() += 1;
            if task.is_overdue() && !task.state().is_final() {
                overdue.push(task.id());
            }
        }
        overdue.sort_by_key(|id| st.tasks.get(id).map(Task::seq));

        let mut recent: Vec<&Task> = st.tasks.values().collect();
        recent.sort_by(|a, b| {
            b.created_at_ms()
                .cmp(&a.created_at_ms())
                .then_with(|| b.seq().cmp(&a.seq()))
        });
        TaskSummary {
            total_tasks: st.tasks.len(),
            by_state,
            by_priority,
            overdue,
            recent: recent
                .into_iter()
                .take(RECENT_TASKS)
                .map(TaskSnapshot::from)
                .collect(),
        }
    }

    /// Tasks in the ready set, in queue order.
    #[must_use]
    pub fn ready_tasks(&self) -> Vec<TaskSnapshot> {
        let st = self.shared.state.lock();
        st.ready
            .iter()
            .filter_map(|id| st.tasks.get(&id))
            .map(TaskSnapshot::from)
            .collect()
    }

    /// Tasks holding a worker slot, oldest submission first. Includes
    /// cancelled tasks whose worker has not returned yet.
    #[must_use]
    pub fn running_tasks(&self) -> Vec<TaskSnapshot> {
        let st = self.shared.state.lock();
        let mut running: Vec<&Task> = st.running.keys().filter_map(|id| st.tasks.get(id)).collect();
        running.sort_by_key(|task| task.seq());
        running.into_iter().map(TaskSnapshot::from).collect()
    }

    /// Completed tasks in completion order.
    #[must_use]
    pub fn completed_tasks(&self) -> Vec<TaskSnapshot> {
        self.history(|st| &st.completed)
    }

    /// Terminally failed tasks in failure order.
    #[must_use]
    pub fn failed_tasks(&self) -> Vec<TaskSnapshot> {
        self.history(|st| &st.failed)
    }

    /// Cancelled tasks in cancellation order.
    #[must_use]
    pub fn cancelled_tasks(&self) -> Vec<TaskSnapshot> {
        self.history(|st| &st.cancelled)
    }

    /// Blocked tasks waiting on dependencies.
    #[must_use]
    pub fn blocked_tasks(&self) -> Vec<TaskSnapshot> {
        let st = self.shared.state.lock();
        st.dependencies
            .blocked()
            .iter()
            .filter_map(|id| st.tasks.get(id))
            .map(TaskSnapshot::from)
            .collect()
    }

    /// Blocked tasks with a dependency that was cancelled or failed for good.
    #[must_use]
    pub fn orphaned_tasks(&self) -> Vec<TaskId> {
        let st = self.shared.state.lock();
        st.dependencies.orphans(&st.tasks)
    }

    fn history(&self, pick: impl Fn(&SchedulerState) -> &Vec<TaskId>) -> Vec<TaskSnapshot> {
        let st = self.shared.state.lock();
        pick(&st)
            .iter()
            .filter_map(|id| st.tasks.get(id))
            .map(TaskSnapshot::from)
            .collect()
    }

    /// Wait until the task is `Completed`, `Failed` or `Cancelled`, or
    /// `timeout` elapses. Returns the state observed last.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    pub async fn wait_for(
        &self,
        id: TaskId,
        timeout: Duration,
    ) -> Result<TaskState, SchedulerError> {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.status(id)?;
            let settled = matches!(
                state,
                TaskState::Completed | TaskState::Failed | TaskState::Cancelled
            );
            if settled || Instant::now() >= deadline {
                return Ok(state);
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    /// Wait until nothing is ready or running, or `timeout` elapses. Returns
    /// whether the scheduler went idle.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let idle = {
                let st = self.shared.state.lock();
                st.ready.is_empty() && st.running.is_empty()
            };
            if idle {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }
}

impl<S> Drop for TaskScheduler<S> {
    fn drop(&mut self) {
        if let Some(token) = self.shutdown.get_mut().take() {
            token.cancel();
        }
    }
}
