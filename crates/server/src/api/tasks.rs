//! Task API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use atelier_core::{Task, TaskOutcome};

use super::handlers::{scheduler_error, ErrorResponse};
use crate::state::AppState;

/// Request body for reporting an outcome. The task id comes from the path.
#[derive(Debug, Deserialize)]
pub struct OutcomeBody {
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Response for listing the queue
#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub depth: usize,
    /// Queued tasks in scheduling order
    pub tasks: Vec<Task>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Get a task by ID (active or archived)
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, (StatusCode, Json<ErrorResponse>)> {
    match state.orchestrator().get_task(id).await {
        Some(task) => Ok(Json(task)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("task not found: {}", id),
            }),
        )),
    }
}

/// Report a task outcome from the worker fleet
pub async fn report_outcome(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<OutcomeBody>,
) -> Result<StatusCode, impl IntoResponse> {
    let outcome = TaskOutcome {
        task_id: id,
        success: body.success,
        error_message: body.error_message,
    };

    match state.orchestrator().report_outcome(outcome).await {
        Ok(()) => Ok(StatusCode::ACCEPTED),
        Err(e) => Err(scheduler_error(e)),
    }
}

/// Cancel a task (DELETE endpoint)
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, impl IntoResponse> {
    match state.orchestrator().cancel_task(id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(scheduler_error(e)),
    }
}

/// List queued tasks in scheduling order
pub async fn get_queue(State(state): State<Arc<AppState>>) -> Json<QueueResponse> {
    let tasks = state.orchestrator().queued_tasks().await;
    Json(QueueResponse {
        depth: tasks.len(),
        tasks,
    })
}
