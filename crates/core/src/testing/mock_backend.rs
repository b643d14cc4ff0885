//! Mock generation backend for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::backend::{BackendError, GenerationBackend};
use crate::task::Task;

/// A recorded dispatch for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedDispatch {
    /// Snapshot of the task at dispatch time.
    pub task: Task,
    /// Worker the task was dispatched to.
    pub worker_id: String,
    /// When the dispatch happened.
    pub timestamp: DateTime<Utc>,
}

/// A recorded cancel call.
#[derive(Debug, Clone)]
pub struct RecordedCancel {
    pub task_id: Uuid,
    pub worker_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Mock implementation of the GenerationBackend trait.
///
/// Provides controllable behavior for testing:
/// - Track dispatch/cancel calls for assertions
/// - Reject dispatches for chosen tasks
/// - Fail the next N dispatches with a transport error
#[derive(Debug, Default)]
pub struct MockBackend {
    dispatched: Arc<RwLock<Vec<RecordedDispatch>>>,
    cancelled: Arc<RwLock<Vec<RecordedCancel>>>,
    /// Tasks whose dispatch should be rejected.
    reject_tasks: Arc<RwLock<HashSet<Uuid>>>,
    /// Remaining dispatches to fail with a transport error.
    fail_dispatches: Arc<RwLock<u32>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded dispatch calls.
    pub async fn dispatched(&self) -> Vec<RecordedDispatch> {
        self.dispatched.read().await.clone()
    }

    /// Get all recorded cancel calls.
    pub async fn cancelled(&self) -> Vec<RecordedCancel> {
        self.cancelled.read().await.clone()
    }

    /// Reject every dispatch of the given task.
    pub async fn reject_task(&self, task_id: Uuid) {
        self.reject_tasks.write().await.insert(task_id);
    }

    /// Fail the next `count` dispatches with a transport error.
    pub async fn fail_next_dispatches(&self, count: u32) {
        *self.fail_dispatches.write().await = count;
    }

    pub async fn clear_recorded(&self) {
        self.dispatched.write().await.clear();
        self.cancelled.write().await.clear();
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn dispatch(&self, task: &Task, worker_id: &str) -> Result<(), BackendError> {
        {
            let mut remaining = self.fail_dispatches.write().await;
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BackendError::Transport("injected failure".to_string()));
            }
        }
        if self.reject_tasks.read().await.contains(&task.id) {
            return Err(BackendError::Rejected(format!(
                "task {} rejected by test setup",
                task.id
            )));
        }

        self.dispatched.write().await.push(RecordedDispatch {
            task: task.clone(),
            worker_id: worker_id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn cancel(&self, task_id: Uuid, worker_id: &str) -> Result<(), BackendError> {
        self.cancelled.write().await.push(RecordedCancel {
            task_id,
            worker_id: worker_id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
