//! Scheduler status API handlers.

use axum::{extract::State, Json};
use std::sync::Arc;

use atelier_core::SchedulerStatus;

use crate::state::AppState;

/// Get the current scheduler status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    Json(state.orchestrator().status().await)
}
