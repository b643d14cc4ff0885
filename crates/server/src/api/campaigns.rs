//! Campaign API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use atelier_core::{CampaignBrief, CampaignMetadata, CampaignStatus};

use super::handlers::scheduler_error;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for submitting a campaign
#[derive(Debug, Deserialize)]
pub struct SubmitCampaignBody {
    /// The validated campaign brief
    #[serde(flatten)]
    pub brief: CampaignBrief,
    /// Metadata derived from brief analysis; defaults describe a
    /// low-parallelism campaign
    #[serde(default)]
    pub metadata: Option<CampaignMetadata>,
}

/// Response for a submitted campaign
#[derive(Debug, Serialize)]
pub struct SubmitCampaignResponse {
    pub campaign_id: Uuid,
    pub task_ids: Vec<Uuid>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a campaign for decomposition and scheduling
pub async fn submit_campaign(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitCampaignBody>,
) -> Result<(StatusCode, Json<SubmitCampaignResponse>), impl IntoResponse> {
    let metadata = body.metadata.unwrap_or_default();

    match state
        .orchestrator()
        .submit_campaign(body.brief, metadata)
        .await
    {
        Ok((campaign_id, task_ids)) => Ok((
            StatusCode::CREATED,
            Json(SubmitCampaignResponse {
                campaign_id,
                task_ids,
            }),
        )),
        Err(e) => Err(scheduler_error(e)),
    }
}

/// Get the aggregated status of a campaign
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignStatus>, impl IntoResponse> {
    match state.orchestrator().campaign_status(id).await {
        Ok(status) => Ok(Json(status)),
        Err(e) => Err(scheduler_error(e)),
    }
}
