//! Types for the scheduling orchestrator.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::task::{ResourceKind, TaskStatus};

/// Errors that can occur during scheduling.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Task not found (neither active nor archived).
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    /// Campaign not found.
    #[error("campaign not found: {0}")]
    CampaignNotFound(Uuid),

    /// Operation not valid for the task's current status.
    #[error("invalid task state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Campaign decomposition produced a dependency cycle.
    #[error("dependency cycle in campaign {0}")]
    CyclicDependency(Uuid),

    /// Worker registry error.
    #[error("worker error: {0}")]
    Worker(#[from] crate::worker::WorkerError),

    /// Backend dispatch/cancel error.
    #[error("backend error: {0}")]
    Backend(#[from] crate::backend::BackendError),

    /// The orchestrator loops are not running.
    #[error("scheduler is not running")]
    NotRunning,
}

/// Events emitted by the orchestrator as work moves through the system.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A task was assigned to a worker.
    TaskAssigned { task_id: Uuid, worker_id: String },
    /// A task reached a terminal status.
    TaskTerminal { task_id: Uuid, status: TaskStatus },
    /// Repeated capacity misses triggered a scale-up advisory.
    ScaleUpRequested {
        resource: ResourceKind,
        shortfall: f64,
    },
}

/// Callback invoked for every [`SchedulerEvent`].
pub type EventCallback = Arc<dyn Fn(SchedulerEvent) + Send + Sync>;

/// Outcome of a dispatched task, reported by the worker fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Task this outcome applies to.
    pub task_id: Uuid,
    /// Whether execution succeeded.
    pub success: bool,
    /// Error description when `success` is false.
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Whether the background loops are running.
    pub running: bool,
    /// Tasks waiting in the queue.
    pub queued_count: usize,
    /// Tasks assigned or in progress.
    pub in_flight_count: usize,
    /// Terminal tasks retained in the archive.
    pub archived_count: usize,
    /// Workers accepting assignments.
    pub online_workers: usize,
    /// Workers marked offline.
    pub offline_workers: usize,
    /// Name of the configured generation backend.
    pub backend: String,
}

/// Aggregated view of one campaign's tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignStatus {
    /// Campaign ID.
    pub campaign_id: Uuid,
    /// Campaign name from the brief.
    pub name: String,
    /// When the campaign was submitted.
    pub submitted_at: DateTime<Utc>,
    /// Total tasks the campaign decomposed into.
    pub total_tasks: usize,
    /// Tasks per status.
    pub queued: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Mean progress across all tasks (0-100).
    pub progress_pct: f32,
    /// Error message of the first task that failed, if any. Tasks failed
    /// by dependency propagation echo this root cause.
    pub first_error: Option<String>,
}
