//! Worker fleet API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use atelier_core::{ResourceProfile, WorkerUtilization};

use super::handlers::scheduler_error;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for registering a worker
#[derive(Debug, Deserialize)]
pub struct RegisterWorkerBody {
    /// Stable worker identifier; re-registering refreshes capacity
    pub worker_id: String,
    /// Declared feature flags (e.g. "image_generation")
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Per-resource capacity (e.g. {"cpu": 4.0, "gpu": 1.0})
    pub max_capacity: ResourceProfile,
}

/// Request body for a heartbeat
#[derive(Debug, Default, Deserialize)]
pub struct HeartbeatBody {
    /// Load the worker observes locally; advisory only
    #[serde(default)]
    pub reported_load: Option<ResourceProfile>,
}

#[derive(Debug, Serialize)]
pub struct RegisterWorkerResponse {
    pub worker_id: String,
}

/// Response for listing workers
#[derive(Debug, Serialize)]
pub struct ListWorkersResponse {
    pub workers: Vec<WorkerUtilization>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a worker (idempotent; re-registering refreshes capabilities)
pub async fn register_worker(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterWorkerBody>,
) -> (StatusCode, Json<RegisterWorkerResponse>) {
    state
        .orchestrator()
        .registry()
        .register(body.worker_id.clone(), body.capabilities, body.max_capacity)
        .await;

    (
        StatusCode::CREATED,
        Json(RegisterWorkerResponse {
            worker_id: body.worker_id,
        }),
    )
}

/// Record a worker heartbeat
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<HeartbeatBody>>,
) -> Result<StatusCode, impl IntoResponse> {
    let reported_load = body.and_then(|b| b.0.reported_load);

    match state
        .orchestrator()
        .worker_heartbeat(&id, reported_load)
        .await
    {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(scheduler_error(e)),
    }
}

/// List all workers with their utilization
pub async fn list_workers(State(state): State<Arc<AppState>>) -> Json<ListWorkersResponse> {
    let workers = state.orchestrator().worker_utilization().await;
    Json(ListWorkersResponse { workers })
}
