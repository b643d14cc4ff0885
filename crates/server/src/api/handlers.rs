use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use atelier_core::{Config, SchedulerError, WorkerError};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Config> {
    Json(state.config().clone())
}

/// Prometheus metrics endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    collect_dynamic_metrics(&state).await;
    encode_metrics()
}

/// Error response body shared by all API handlers.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map a scheduler error to an HTTP status and error body.
pub fn scheduler_error(e: SchedulerError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        SchedulerError::TaskNotFound(_) | SchedulerError::CampaignNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        SchedulerError::InvalidState { .. } => StatusCode::CONFLICT,
        SchedulerError::CyclicDependency(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SchedulerError::Worker(WorkerError::NotFound(_)) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}
