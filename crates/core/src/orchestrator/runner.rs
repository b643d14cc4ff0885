//! Scheduler orchestrator implementation.
//!
//! Owns all mutable scheduling state and drives it from three loops:
//! - Scheduling: drain outcomes, then assign queued tasks to workers
//! - Heartbeat monitor: mark silent workers offline and requeue their tasks
//! - Scale advisory: report aggregate resource shortfalls on deep backlogs
//!
//! Every state transition happens inside `tick()`, so tests can drive the
//! whole scheduler deterministically without the loops running.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::GenerationBackend;
use crate::campaign::{CampaignBrief, CampaignMetadata};
use crate::metrics;
use crate::task::{QueueEntry, ResourceKind, ResourceProfile, Task, TaskQueue, TaskStatus};
use crate::worker::{WorkerError, WorkerRegistry, WorkerUtilization};

use super::config::OrchestratorConfig;
use super::decompose::decompose_campaign;
use super::selector::find_optimal_worker;
use super::types::{
    CampaignStatus, EventCallback, SchedulerError, SchedulerEvent, SchedulerStatus, TaskOutcome,
};

/// Bookkeeping for one submitted campaign.
#[derive(Debug, Clone)]
struct CampaignRecord {
    name: String,
    submitted_at: DateTime<Utc>,
    task_ids: Vec<Uuid>,
}

/// All mutable scheduling state, behind a single lock.
///
/// Non-terminal tasks live in `tasks`; terminal ones move to `archive` and
/// never come back. Queue entries are immutable snapshots, so an entry whose
/// task is no longer queued is simply dropped when popped.
#[derive(Default)]
struct SchedulerState {
    queue: TaskQueue,
    tasks: HashMap<Uuid, Task>,
    archive: HashMap<Uuid, Task>,
    campaigns: HashMap<Uuid, CampaignRecord>,
    capacity_misses: HashMap<Uuid, u32>,
}

/// Why a popped queue entry could not be assigned right now.
enum EntryDisposition {
    /// Entry no longer matches a queued task; drop it.
    Stale,
    /// Dependencies are still pending; put the entry back after the pass.
    Blocked,
    /// All dependencies completed; try to assign this task.
    Ready(Box<Task>),
}

/// The scheduling orchestrator.
pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: Arc<WorkerRegistry>,
    backend: Arc<dyn GenerationBackend>,
    event_callback: Option<EventCallback>,

    state: RwLock<SchedulerState>,
    outcome_tx: mpsc::UnboundedSender<TaskOutcome>,
    outcome_rx: Mutex<mpsc::UnboundedReceiver<TaskOutcome>>,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        registry: Arc<WorkerRegistry>,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            registry,
            backend,
            event_callback: None,
            state: RwLock::new(SchedulerState::default()),
            outcome_tx,
            outcome_rx: Mutex::new(outcome_rx),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Install a callback invoked for every [`SchedulerEvent`].
    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.event_callback = Some(callback);
        self
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn emit(&self, event: SchedulerEvent) {
        if let Some(callback) = &self.event_callback {
            callback(event);
        }
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Decompose a campaign and enqueue its tasks. Returns the campaign id
    /// and the ids of the created tasks in enqueue order.
    pub async fn submit_campaign(
        &self,
        brief: CampaignBrief,
        metadata: CampaignMetadata,
    ) -> Result<(Uuid, Vec<Uuid>), SchedulerError> {
        let campaign_id = Uuid::new_v4();
        let now = Utc::now();

        let tasks = decompose_campaign(
            campaign_id,
            &brief,
            &metadata,
            self.config.parallelization_threshold,
            self.config.default_max_retries,
            now,
        )?;
        let task_ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();

        let mut state = self.state.write().await;
        for task in tasks {
            state.queue.push(&task);
            state.tasks.insert(task.id, task);
            metrics::TASKS_SUBMITTED.inc();
        }
        state.campaigns.insert(
            campaign_id,
            CampaignRecord {
                name: brief.name.clone(),
                submitted_at: now,
                task_ids: task_ids.clone(),
            },
        );
        metrics::CAMPAIGNS_SUBMITTED.inc();

        info!(
            "Campaign {} ({}) submitted with {} tasks",
            campaign_id,
            brief.name,
            task_ids.len()
        );
        Ok((campaign_id, task_ids))
    }

    // =========================================================================
    // Outcomes
    // =========================================================================

    /// Record a task outcome reported by the worker fleet. Applied at the
    /// next tick.
    pub async fn report_outcome(&self, outcome: TaskOutcome) -> Result<(), SchedulerError> {
        {
            let state = self.state.read().await;
            let task = state
                .tasks
                .get(&outcome.task_id)
                .ok_or(SchedulerError::TaskNotFound(outcome.task_id))?;
            if !matches!(task.status, TaskStatus::Assigned | TaskStatus::InProgress) {
                return Err(SchedulerError::InvalidState {
                    expected: "Assigned or InProgress".to_string(),
                    actual: format!("{:?}", task.status),
                });
            }
        }
        // The receiver lives as long as self, so this cannot fail.
        let _ = self.outcome_tx.send(outcome);
        Ok(())
    }

    async fn drain_outcomes(&self) {
        let mut rx = self.outcome_rx.lock().await;
        while let Ok(outcome) = rx.try_recv() {
            self.apply_outcome(outcome).await;
        }
    }

    async fn apply_outcome(&self, outcome: TaskOutcome) {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let Some(task) = state.tasks.get(&outcome.task_id).cloned() else {
            // Task was cancelled or requeued after the worker reported; the
            // outcome is moot.
            debug!("Dropping outcome for unknown task {}", outcome.task_id);
            return;
        };
        if !matches!(task.status, TaskStatus::Assigned | TaskStatus::InProgress) {
            debug!(
                "Dropping outcome for task {} in status {:?}",
                task.id, task.status
            );
            return;
        }

        // Release the worker exactly once, before the task transitions.
        if let Some(worker_id) = &task.assigned_worker {
            if let Err(e) = self.registry.release(worker_id, &task).await {
                warn!("Release failed for task {}: {}", task.id, e);
            }
            if outcome.success {
                let elapsed = task
                    .started_at
                    .map(|t| (now - t).num_seconds().max(0) as f64)
                    .unwrap_or(0.0);
                metrics::TASK_EXECUTION_DURATION
                    .with_label_values(&[task.task_type.as_label()])
                    .observe(elapsed);
                // Faster than estimated nudges the score up, slower down.
                let observation = if elapsed > 0.0 && task.estimated_duration_secs > 0 {
                    (task.estimated_duration_secs as f64 / elapsed).clamp(0.5, 1.5)
                } else {
                    1.0
                };
                self.registry.record_performance(worker_id, observation).await;
            }
        }

        if outcome.success {
            let task = state.tasks.get_mut(&outcome.task_id).unwrap();
            task.status = TaskStatus::Completed;
            task.completed_at = Some(now);
            task.progress_pct = 100.0;
            task.error_message = None;
            info!("Task {} completed", task.id);
            Self::archive_task(&mut state, outcome.task_id, TaskStatus::Completed);
            self.emit(SchedulerEvent::TaskTerminal {
                task_id: outcome.task_id,
                status: TaskStatus::Completed,
            });
            return;
        }

        let error = outcome
            .error_message
            .unwrap_or_else(|| "unspecified failure".to_string());
        let task = state.tasks.get_mut(&outcome.task_id).unwrap();

        if task.retry_count < task.max_retries {
            task.retry_count += 1;
            task.status = TaskStatus::Retrying;
            task.assigned_worker = None;
            task.started_at = None;
            task.error_message = Some(error.clone());
            let snapshot = task.clone();
            state.queue.push(&snapshot);
            metrics::TASK_RETRIES.inc();
            warn!(
                "Task {} failed ({}), retry {}/{}",
                snapshot.id, error, snapshot.retry_count, snapshot.max_retries
            );
            return;
        }

        task.status = TaskStatus::Failed;
        task.completed_at = Some(now);
        task.error_message = Some(error.clone());
        warn!("Task {} failed permanently: {}", outcome.task_id, error);
        Self::archive_task(&mut state, outcome.task_id, TaskStatus::Failed);
        self.emit(SchedulerEvent::TaskTerminal {
            task_id: outcome.task_id,
            status: TaskStatus::Failed,
        });
        self.fail_dependents(&mut state, outcome.task_id, &error, now);
    }

    /// Move a task from the active table to the archive.
    fn archive_task(state: &mut SchedulerState, task_id: Uuid, status: TaskStatus) {
        if let Some(task) = state.tasks.remove(&task_id) {
            state.archive.insert(task_id, task);
        }
        state.capacity_misses.remove(&task_id);
        metrics::TASKS_TERMINAL
            .with_label_values(&[status.as_label()])
            .inc();
    }

    /// Fail every task transitively depending on `root_id`.
    ///
    /// Dependents never executed, so their retry budget is untouched; they
    /// carry the root cause so campaign status shows one coherent error.
    fn fail_dependents(
        &self,
        state: &mut SchedulerState,
        root_id: Uuid,
        root_error: &str,
        now: DateTime<Utc>,
    ) {
        let mut worklist = vec![root_id];
        while let Some(failed_id) = worklist.pop() {
            let dependents: Vec<Uuid> = state
                .tasks
                .values()
                .filter(|t| t.dependencies.contains(&failed_id) && !t.status.is_terminal())
                .map(|t| t.id)
                .collect();

            for dep_id in dependents {
                let task = state.tasks.get_mut(&dep_id).unwrap();
                task.status = TaskStatus::Failed;
                task.completed_at = Some(now);
                task.error_message = Some(format!("dependency {} failed: {}", failed_id, root_error));
                info!("Task {} failed via dependency {}", dep_id, failed_id);
                Self::archive_task(state, dep_id, TaskStatus::Failed);
                self.emit(SchedulerEvent::TaskTerminal {
                    task_id: dep_id,
                    status: TaskStatus::Failed,
                });
                worklist.push(dep_id);
            }
        }
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// One full scheduling round: apply pending outcomes, then walk the queue
    /// and assign every ready task a worker can take. Returns the number of
    /// assignments made.
    pub async fn tick(&self) -> usize {
        let started = Instant::now();
        self.drain_outcomes().await;
        let assigned = self.run_schedule_pass().await;
        self.refresh_gauges().await;
        metrics::TICK_DURATION.observe(started.elapsed().as_secs_f64());
        assigned
    }

    async fn run_schedule_pass(&self) -> usize {
        let now = Utc::now();
        let mut assigned = 0;
        let mut deferred: Vec<QueueEntry> = Vec::new();

        // Drain the queue up front; unassignable entries go back afterwards
        // with their original sequence numbers, preserving order.
        let entries: Vec<QueueEntry> = {
            let mut state = self.state.write().await;
            let mut drained = Vec::with_capacity(state.queue.len());
            while let Some(entry) = state.queue.pop() {
                drained.push(entry);
            }
            drained
        };

        for entry in entries {
            let disposition = {
                let mut state = self.state.write().await;
                self.classify_entry(&mut state, &entry, now)
            };

            let task = match disposition {
                EntryDisposition::Stale => continue,
                EntryDisposition::Blocked => {
                    deferred.push(entry);
                    continue;
                }
                EntryDisposition::Ready(task) => task,
            };

            let candidates = self.registry.schedulable_workers().await;
            let Some(worker) = find_optimal_worker(&task, &candidates, &self.config, now) else {
                self.record_capacity_miss(&task).await;
                deferred.push(entry);
                continue;
            };
            let worker_id = worker.id.clone();

            match self.registry.reserve(&worker_id, &task).await {
                Ok(()) => {}
                Err(WorkerError::CapacityExceeded { .. }) => {
                    // Another reservation landed between scoring and reserve.
                    deferred.push(entry);
                    continue;
                }
                Err(e) => {
                    warn!("Reservation failed for task {}: {}", task.id, e);
                    deferred.push(entry);
                    continue;
                }
            }

            if let Err(e) = self.backend.dispatch(&task, &worker_id).await {
                warn!(
                    "Dispatch of task {} to worker {} failed: {}",
                    task.id, worker_id, e
                );
                if let Err(e) = self.registry.release(&worker_id, &task).await {
                    warn!("Rollback release failed for task {}: {}", task.id, e);
                }
                deferred.push(entry);
                continue;
            }

            let mut state = self.state.write().await;
            if let Some(stored) = state.tasks.get_mut(&task.id) {
                stored.status = TaskStatus::Assigned;
                stored.assigned_worker = Some(worker_id.clone());
                stored.started_at = Some(now);
                stored.error_message = None;
            }
            state.capacity_misses.remove(&task.id);
            metrics::TASKS_ASSIGNED.inc();
            debug!("Task {} assigned to worker {}", task.id, worker_id);
            self.emit(SchedulerEvent::TaskAssigned {
                task_id: task.id,
                worker_id,
            });
            assigned += 1;
        }

        if !deferred.is_empty() {
            let mut state = self.state.write().await;
            for entry in deferred {
                state.queue.push_back(entry);
            }
        }
        assigned
    }

    fn classify_entry(
        &self,
        state: &mut SchedulerState,
        entry: &QueueEntry,
        now: DateTime<Utc>,
    ) -> EntryDisposition {
        let Some(task) = state.tasks.get(&entry.task_id) else {
            return EntryDisposition::Stale;
        };
        if !task.status.is_queued() {
            return EntryDisposition::Stale;
        }

        let mut failed_dep: Option<(Uuid, String)> = None;
        for dep in &task.dependencies {
            if let Some(done) = state.archive.get(dep) {
                match done.status {
                    TaskStatus::Completed => continue,
                    _ => {
                        let reason = done
                            .error_message
                            .clone()
                            .unwrap_or_else(|| done.status.as_label().to_string());
                        failed_dep = Some((*dep, reason));
                        break;
                    }
                }
            } else if state.tasks.contains_key(dep) {
                return EntryDisposition::Blocked;
            } else {
                failed_dep = Some((*dep, "dependency missing".to_string()));
                break;
            }
        }

        if let Some((dep, reason)) = failed_dep {
            let task = state.tasks.get_mut(&entry.task_id).unwrap();
            task.status = TaskStatus::Failed;
            task.completed_at = Some(now);
            task.error_message = Some(format!("dependency {} failed: {}", dep, reason));
            Self::archive_task(state, entry.task_id, TaskStatus::Failed);
            self.emit(SchedulerEvent::TaskTerminal {
                task_id: entry.task_id,
                status: TaskStatus::Failed,
            });
            self.fail_dependents(state, entry.task_id, &reason, now);
            return EntryDisposition::Stale;
        }

        EntryDisposition::Ready(Box::new(task.clone()))
    }

    /// Count a no-fitting-worker event and emit a scale-up advisory once a
    /// High-or-above task has missed too many times in a row.
    async fn record_capacity_miss(&self, task: &Task) {
        metrics::CAPACITY_MISSES.inc();

        let misses = {
            let mut state = self.state.write().await;
            let misses = state.capacity_misses.entry(task.id).or_insert(0);
            *misses += 1;
            *misses
        };

        if !task.priority.is_high_or_above() || misses < self.config.scale_up_after_misses {
            return;
        }

        let spare = self.registry.aggregate_spare_capacity().await;
        let (resource, shortfall) = dominant_shortfall(&task.resource_requirements, &spare);
        warn!(
            "Task {} missed capacity {} times; advising scale-up of {} by {:.2}",
            task.id,
            misses,
            resource.as_label(),
            shortfall
        );
        metrics::SCALE_UP_REQUESTS
            .with_label_values(&[resource.as_label()])
            .inc();
        self.emit(SchedulerEvent::ScaleUpRequested {
            resource,
            shortfall,
        });

        let mut state = self.state.write().await;
        state.capacity_misses.insert(task.id, 0);
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancel a task. Queued tasks are cancelled immediately; in-flight tasks
    /// are cancelled on the backend first, then their worker reservation is
    /// released. Terminal tasks cannot be cancelled.
    pub async fn cancel_task(&self, task_id: Uuid) -> Result<(), SchedulerError> {
        let now = Utc::now();
        let task = {
            let state = self.state.read().await;
            if let Some(done) = state.archive.get(&task_id) {
                return Err(SchedulerError::InvalidState {
                    expected: "a non-terminal status".to_string(),
                    actual: format!("{:?}", done.status),
                });
            }
            state
                .tasks
                .get(&task_id)
                .cloned()
                .ok_or(SchedulerError::TaskNotFound(task_id))?
        };

        if let (Some(worker_id), TaskStatus::Assigned | TaskStatus::InProgress) =
            (task.assigned_worker.as_deref(), task.status)
        {
            self.backend.cancel(task_id, worker_id).await?;
            if let Err(e) = self.registry.release(worker_id, &task).await {
                warn!("Release on cancel failed for task {}: {}", task_id, e);
            }
        }

        let mut state = self.state.write().await;
        let Some(stored) = state.tasks.get_mut(&task_id) else {
            // The task reached a terminal status while we awaited the
            // backend; that outcome wins.
            return Err(SchedulerError::TaskNotFound(task_id));
        };
        stored.status = TaskStatus::Cancelled;
        stored.completed_at = Some(now);
        Self::archive_task(&mut state, task_id, TaskStatus::Cancelled);
        info!("Task {} cancelled", task_id);
        self.emit(SchedulerEvent::TaskTerminal {
            task_id,
            status: TaskStatus::Cancelled,
        });
        self.fail_dependents(&mut state, task_id, "dependency cancelled", now);
        Ok(())
    }

    // =========================================================================
    // Heartbeat sweep and scale advisory
    // =========================================================================

    /// Record a worker heartbeat. The first heartbeat after an assignment
    /// confirms the worker picked the task up, so its assigned tasks move to
    /// in progress.
    pub async fn worker_heartbeat(
        &self,
        worker_id: &str,
        reported_load: Option<ResourceProfile>,
    ) -> Result<(), SchedulerError> {
        self.registry.heartbeat(worker_id, reported_load).await?;

        let mut state = self.state.write().await;
        for task in state.tasks.values_mut() {
            if task.status == TaskStatus::Assigned
                && task.assigned_worker.as_deref() == Some(worker_id)
            {
                task.status = TaskStatus::InProgress;
                debug!("Task {} in progress on worker {}", task.id, worker_id);
            }
        }
        Ok(())
    }

    /// Mark silent workers offline and requeue their in-flight tasks.
    /// Requeued tasks keep their retry budget: the worker failed, not the
    /// task.
    pub async fn sweep_offline_workers(&self, now: DateTime<Utc>) {
        let timeout = chrono::Duration::seconds(self.config.heartbeat_timeout_secs as i64);
        let orphaned = self.registry.sweep_stale(timeout, now).await;
        if orphaned.is_empty() {
            return;
        }

        let mut state = self.state.write().await;
        for (worker_id, task_ids) in orphaned {
            for task_id in task_ids {
                let Some(task) = state.tasks.get_mut(&task_id) else {
                    continue;
                };
                task.status = TaskStatus::Queued;
                task.assigned_worker = None;
                task.started_at = None;
                let snapshot = task.clone();
                state.queue.push(&snapshot);
                metrics::TASKS_REQUEUED_OFFLINE.inc();
                info!(
                    "Task {} requeued after worker {} went offline",
                    task_id, worker_id
                );
            }
        }
    }

    /// Compare the queued tasks' aggregate demand against the fleet's spare
    /// capacity and advise on shortfalls when the backlog is deep.
    pub async fn run_scale_advisory(&self) {
        let (depth, demand) = {
            let state = self.state.read().await;
            let mut demand = ResourceProfile::new();
            let mut depth = 0;
            for task in state.tasks.values().filter(|t| t.status.is_queued()) {
                demand.add(&task.resource_requirements);
                depth += 1;
            }
            (depth, demand)
        };

        if depth < self.config.backlog_scale_threshold {
            return;
        }

        let spare = self.registry.aggregate_spare_capacity().await;
        for (kind, required) in demand.iter() {
            let shortfall = required - spare.get(kind);
            if shortfall > 0.0 {
                info!(
                    "Backlog of {} tasks needs {:.2} more {} than the fleet has spare",
                    depth,
                    shortfall,
                    kind.as_label()
                );
                metrics::SCALE_UP_REQUESTS
                    .with_label_values(&[kind.as_label()])
                    .inc();
                self.emit(SchedulerEvent::ScaleUpRequested {
                    resource: kind,
                    shortfall,
                });
            }
        }
    }

    async fn refresh_gauges(&self) {
        let (queued, in_flight) = {
            let state = self.state.read().await;
            let queued = state.tasks.values().filter(|t| t.status.is_queued()).count();
            let in_flight = state
                .tasks
                .values()
                .filter(|t| matches!(t.status, TaskStatus::Assigned | TaskStatus::InProgress))
                .count();
            (queued, in_flight)
        };
        metrics::QUEUE_DEPTH.set(queued as i64);
        metrics::TASKS_IN_FLIGHT.set(in_flight as i64);

        let utilization = self.registry.utilization().await;
        let mut by_status: HashMap<&'static str, i64> = HashMap::new();
        for snapshot in &utilization {
            *by_status.entry(snapshot.status.as_label()).or_insert(0) += 1;
        }
        for label in ["idle", "busy", "overloaded", "offline"] {
            metrics::WORKERS_BY_STATUS
                .with_label_values(&[label])
                .set(by_status.get(label).copied().unwrap_or(0));
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_task(&self, task_id: Uuid) -> Option<Task> {
        let state = self.state.read().await;
        state
            .tasks
            .get(&task_id)
            .or_else(|| state.archive.get(&task_id))
            .cloned()
    }

    /// Snapshot of queued tasks, most urgent first.
    pub async fn queued_tasks(&self) -> Vec<Task> {
        let state = self.state.read().await;
        let mut queued: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.status.is_queued())
            .cloned()
            .collect();
        queued.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(match (a.deadline, b.deadline) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then(a.created_at.cmp(&b.created_at))
        });
        queued
    }

    pub async fn queue_depth(&self) -> usize {
        let state = self.state.read().await;
        state.tasks.values().filter(|t| t.status.is_queued()).count()
    }

    pub async fn campaign_status(&self, campaign_id: Uuid) -> Result<CampaignStatus, SchedulerError> {
        let state = self.state.read().await;
        let record = state
            .campaigns
            .get(&campaign_id)
            .ok_or(SchedulerError::CampaignNotFound(campaign_id))?;

        let mut status = CampaignStatus {
            campaign_id,
            name: record.name.clone(),
            submitted_at: record.submitted_at,
            total_tasks: record.task_ids.len(),
            queued: 0,
            in_flight: 0,
            completed: 0,
            failed: 0,
            cancelled: 0,
            progress_pct: 0.0,
            first_error: None,
        };

        let mut progress_sum = 0.0f32;
        let mut first_failure: Option<(DateTime<Utc>, String)> = None;
        for task_id in &record.task_ids {
            let Some(task) = state
                .tasks
                .get(task_id)
                .or_else(|| state.archive.get(task_id))
            else {
                continue;
            };
            progress_sum += task.progress_pct;
            match task.status {
                TaskStatus::Queued | TaskStatus::Retrying => status.queued += 1,
                TaskStatus::Assigned | TaskStatus::InProgress => status.in_flight += 1,
                TaskStatus::Completed => status.completed += 1,
                TaskStatus::Cancelled => status.cancelled += 1,
                TaskStatus::Failed => {
                    status.failed += 1;
                    if let (Some(at), Some(msg)) = (task.completed_at, task.error_message.clone()) {
                        let earlier = first_failure
                            .as_ref()
                            .map(|(seen, _)| at < *seen)
                            .unwrap_or(true);
                        // Dependency failures echo the root cause, so prefer
                        // the earliest direct failure.
                        if earlier && !msg.starts_with("dependency ") {
                            first_failure = Some((at, msg));
                        }
                    }
                }
            }
        }
        if status.total_tasks > 0 {
            status.progress_pct = progress_sum / status.total_tasks as f32;
        }
        if first_failure.is_none() {
            // Only propagated failures exist; surface one of those instead.
            for task_id in &record.task_ids {
                if let Some(task) = state.archive.get(task_id) {
                    if task.status == TaskStatus::Failed {
                        first_failure = task
                            .completed_at
                            .zip(task.error_message.clone());
                        break;
                    }
                }
            }
        }
        status.first_error = first_failure.map(|(_, msg)| msg);
        Ok(status)
    }

    pub async fn status(&self) -> SchedulerStatus {
        let (queued, in_flight, archived) = {
            let state = self.state.read().await;
            let queued = state.tasks.values().filter(|t| t.status.is_queued()).count();
            let in_flight = state
                .tasks
                .values()
                .filter(|t| matches!(t.status, TaskStatus::Assigned | TaskStatus::InProgress))
                .count();
            (queued, in_flight, state.archive.len())
        };
        let (online, offline) = self.registry.counts().await;

        SchedulerStatus {
            running: self.running.load(Ordering::Relaxed),
            queued_count: queued,
            in_flight_count: in_flight,
            archived_count: archived,
            online_workers: online,
            offline_workers: offline,
            backend: self.backend.name().to_string(),
        }
    }

    pub async fn worker_utilization(&self) -> Vec<WorkerUtilization> {
        self.registry.utilization().await
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start the background loops.
    pub fn start(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }
        info!("Starting scheduler (backend: {})", self.backend.name());
        metrics::SCHEDULER_RUNNING.set(1);

        Arc::clone(&self).spawn_scheduling_loop();
        Arc::clone(&self).spawn_heartbeat_loop();
        self.spawn_advisory_loop();

        info!("Scheduler started");
    }

    /// Stop the background loops gracefully. In-flight tasks keep running on
    /// their workers; outcomes reported after a restart are dropped.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Scheduler not running");
            return;
        }
        info!("Stopping scheduler");
        metrics::SCHEDULER_RUNNING.set(0);
        let _ = self.shutdown_tx.send(());
        tokio::time::sleep(Duration::from_millis(100)).await;
        info!("Scheduler stopped");
    }

    fn spawn_scheduling_loop(self: Arc<Self>) {
        let running = Arc::clone(&self.running);
        let interval = self.config.tick_interval_ms;
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let orchestrator = self;

        tokio::spawn(async move {
            info!("Scheduling loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Scheduling loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(interval)) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        orchestrator.tick().await;
                    }
                }
            }
            info!("Scheduling loop stopped");
        });
    }

    fn spawn_heartbeat_loop(self: Arc<Self>) {
        let running = Arc::clone(&self.running);
        let interval = self.config.heartbeat_sweep_interval_ms;
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let orchestrator = self;

        tokio::spawn(async move {
            info!("Heartbeat monitor started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Heartbeat monitor received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(interval)) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        orchestrator.sweep_offline_workers(Utc::now()).await;
                    }
                }
            }
            info!("Heartbeat monitor stopped");
        });
    }

    fn spawn_advisory_loop(self: Arc<Self>) {
        let running = Arc::clone(&self.running);
        let interval = self.config.scale_advisory_interval_ms;
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let orchestrator = self;

        tokio::spawn(async move {
            info!("Scale advisory loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Scale advisory loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(interval)) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        orchestrator.run_scale_advisory().await;
                    }
                }
            }
            info!("Scale advisory loop stopped");
        });
    }
}

/// The required resource the fleet is most short of, and by how much.
fn dominant_shortfall(required: &ResourceProfile, spare: &ResourceProfile) -> (ResourceKind, f64) {
    let mut best = (ResourceKind::Cpu, f64::MIN);
    for (kind, amount) in required.iter() {
        let shortfall = amount - spare.get(kind);
        if shortfall > best.1 {
            best = (kind, shortfall);
        }
    }
    if best.1 == f64::MIN {
        (ResourceKind::Cpu, 0.0)
    } else {
        (best.0, best.1.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LogBackend;
    use crate::campaign::ClientTier;
    use crate::task::ResourceKind;

    fn orchestrator() -> Orchestrator {
        let config = OrchestratorConfig::default();
        let registry = Arc::new(WorkerRegistry::new(config.overload_ratio));
        Orchestrator::new(config, registry, Arc::new(LogBackend::new()))
    }

    fn brief(name: &str) -> CampaignBrief {
        CampaignBrief {
            name: name.to_string(),
            products: vec!["poster".to_string()],
            deadline: None,
            tags: vec![],
            client_tier: ClientTier::Standard,
        }
    }

    async fn register_capable_worker(orch: &Orchestrator, id: &str) {
        orch.registry()
            .register(
                id,
                vec![
                    "image_generation".to_string(),
                    "quality_checks".to_string(),
                ],
                ResourceProfile::new()
                    .with(ResourceKind::Cpu, 8.0)
                    .with(ResourceKind::Memory, 8.0)
                    .with(ResourceKind::Gpu, 8.0)
                    .with(ResourceKind::ApiQuota, 1000.0)
                    .with(ResourceKind::Network, 8.0),
            )
            .await;
    }

    #[tokio::test]
    async fn test_submit_and_assign_first_stage_only() {
        let orch = orchestrator();
        register_capable_worker(&orch, "w1").await;

        let (_, task_ids) = orch
            .submit_campaign(brief("pipeline"), CampaignMetadata::default())
            .await
            .unwrap();
        assert_eq!(task_ids.len(), 3);

        // Only planning is dependency-free, so one assignment per tick until
        // outcomes arrive.
        let assigned = orch.tick().await;
        assert_eq!(assigned, 1);

        let planning = orch.get_task(task_ids[0]).await.unwrap();
        assert_eq!(planning.status, TaskStatus::Assigned);
        assert_eq!(planning.assigned_worker.as_deref(), Some("w1"));

        let bulk = orch.get_task(task_ids[1]).await.unwrap();
        assert_eq!(bulk.status, TaskStatus::Queued);
    }

    #[tokio::test]
    async fn test_dependency_gating_end_to_end() {
        let orch = orchestrator();
        register_capable_worker(&orch, "w1").await;

        let (_, task_ids) = orch
            .submit_campaign(brief("gated"), CampaignMetadata::default())
            .await
            .unwrap();
        orch.tick().await;

        orch.report_outcome(TaskOutcome {
            task_id: task_ids[0],
            success: true,
            error_message: None,
        })
        .await
        .unwrap();
        let assigned = orch.tick().await;
        assert_eq!(assigned, 1);

        assert_eq!(
            orch.get_task(task_ids[0]).await.unwrap().status,
            TaskStatus::Completed
        );
        assert_eq!(
            orch.get_task(task_ids[1]).await.unwrap().status,
            TaskStatus::Assigned
        );
        assert_eq!(
            orch.get_task(task_ids[2]).await.unwrap().status,
            TaskStatus::Queued
        );
    }

    #[tokio::test]
    async fn test_retry_budget_then_dependency_propagation() {
        let orch = orchestrator();
        register_capable_worker(&orch, "w1").await;

        let (_, task_ids) = orch
            .submit_campaign(brief("doomed"), CampaignMetadata::default())
            .await
            .unwrap();
        let planning_id = task_ids[0];

        // Fail planning through its whole retry budget.
        for _ in 0..4 {
            orch.tick().await;
            orch.report_outcome(TaskOutcome {
                task_id: planning_id,
                success: false,
                error_message: Some("renderer crashed".to_string()),
            })
            .await
            .unwrap();
        }
        orch.tick().await;

        let planning = orch.get_task(planning_id).await.unwrap();
        assert_eq!(planning.status, TaskStatus::Failed);
        assert_eq!(planning.retry_count, 3);

        // Both dependents fail without ever consuming retries, carrying the
        // root cause.
        for dependent in &task_ids[1..] {
            let task = orch.get_task(*dependent).await.unwrap();
            assert_eq!(task.status, TaskStatus::Failed);
            assert_eq!(task.retry_count, 0);
            assert!(task.error_message.as_deref().unwrap().contains("renderer crashed"));
        }

        let status = orch
            .campaign_status(planning.campaign_id)
            .await
            .unwrap();
        assert_eq!(status.failed, 3);
        assert_eq!(status.first_error.as_deref(), Some("renderer crashed"));
    }

    #[tokio::test]
    async fn test_cancel_queued_task() {
        let orch = orchestrator();
        let (_, task_ids) = orch
            .submit_campaign(brief("cancelled"), CampaignMetadata::default())
            .await
            .unwrap();

        orch.cancel_task(task_ids[0]).await.unwrap();
        assert_eq!(
            orch.get_task(task_ids[0]).await.unwrap().status,
            TaskStatus::Cancelled
        );

        // Cancelling again is an error: the task is terminal.
        let err = orch.cancel_task(task_ids[0]).await.unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidState { .. }));

        // Dependents of a cancelled task can never run.
        assert_eq!(
            orch.get_task(task_ids[1]).await.unwrap().status,
            TaskStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_offline_sweep_requeues_without_consuming_retries() {
        let orch = orchestrator();
        register_capable_worker(&orch, "w1").await;

        let (_, task_ids) = orch
            .submit_campaign(brief("orphaned"), CampaignMetadata::default())
            .await
            .unwrap();
        orch.tick().await;
        assert_eq!(
            orch.get_task(task_ids[0]).await.unwrap().status,
            TaskStatus::Assigned
        );

        let later = Utc::now() + chrono::Duration::seconds(120);
        orch.sweep_offline_workers(later).await;

        let task = orch.get_task(task_ids[0]).await.unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.retry_count, 0);
        assert!(task.assigned_worker.is_none());
    }

    #[tokio::test]
    async fn test_outcome_for_unknown_task_is_rejected() {
        let orch = orchestrator();
        let err = orch
            .report_outcome(TaskOutcome {
                task_id: Uuid::new_v4(),
                success: true,
                error_message: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_capacity_miss_leaves_task_queued() {
        let orch = orchestrator();
        // Worker too small for any generated task.
        orch.registry()
            .register(
                "tiny",
                vec!["image_generation".to_string()],
                ResourceProfile::new().with(ResourceKind::Cpu, 0.01),
            )
            .await;

        let (_, task_ids) = orch
            .submit_campaign(brief("stuck"), CampaignMetadata::default())
            .await
            .unwrap();
        let assigned = orch.tick().await;
        assert_eq!(assigned, 0);
        assert_eq!(
            orch.get_task(task_ids[0]).await.unwrap().status,
            TaskStatus::Queued
        );
        assert_eq!(orch.queue_depth().await, 3);
    }

    #[test]
    fn test_dominant_shortfall() {
        let required = ResourceProfile::new()
            .with(ResourceKind::Cpu, 2.0)
            .with(ResourceKind::Gpu, 4.0);
        let spare = ResourceProfile::new()
            .with(ResourceKind::Cpu, 3.0)
            .with(ResourceKind::Gpu, 1.0);

        let (kind, shortfall) = dominant_shortfall(&required, &spare);
        assert_eq!(kind, ResourceKind::Gpu);
        assert!((shortfall - 3.0).abs() < 1e-9);
    }
}
