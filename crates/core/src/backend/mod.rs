//! Interface to the external creative-generation backend.
//!
//! The scheduler never runs generation work itself: on assignment it hands
//! the task to a backend, and the backend (or the worker fleet behind it)
//! reports the outcome back through the orchestrator's outcome channel.

mod webhook;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::task::Task;

pub use webhook::{WebhookBackend, WebhookConfig};

/// Errors from backend dispatch/cancel calls.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure reaching the backend.
    #[error("backend transport error: {0}")]
    Transport(String),

    /// Backend refused the request.
    #[error("backend rejected request: {0}")]
    Rejected(String),
}

/// The external generation collaborator.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Start executing a task on the given worker. Called once per
    /// assignment; failures leave the task queued.
    async fn dispatch(&self, task: &Task, worker_id: &str) -> Result<(), BackendError>;

    /// Request cancellation of an in-flight task. The caller releases the
    /// worker's reserved load only after this returns Ok.
    async fn cancel(&self, task_id: Uuid, worker_id: &str) -> Result<(), BackendError>;

    /// Backend name for logs and status output.
    fn name(&self) -> &'static str;
}

/// Backend that only logs dispatches. Used for local runs and as the
/// fallback when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogBackend;

impl LogBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GenerationBackend for LogBackend {
    async fn dispatch(&self, task: &Task, worker_id: &str) -> Result<(), BackendError> {
        info!(
            "Dispatching task {} ({}) to worker {}",
            task.id,
            task.task_type.as_label(),
            worker_id
        );
        Ok(())
    }

    async fn cancel(&self, task_id: Uuid, worker_id: &str) -> Result<(), BackendError> {
        info!("Cancelling task {} on worker {}", task_id, worker_id);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
