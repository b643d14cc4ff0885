use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{campaigns, handlers, middleware::metrics_middleware, scheduler, tasks, workers};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Campaigns
        .route("/campaigns", post(campaigns::submit_campaign))
        .route("/campaigns/{id}", get(campaigns::get_campaign))
        // Tasks
        .route("/tasks/{id}", get(tasks::get_task))
        .route("/tasks/{id}", delete(tasks::cancel_task))
        .route("/tasks/{id}/outcome", post(tasks::report_outcome))
        .route("/queue", get(tasks::get_queue))
        // Workers
        .route("/workers", post(workers::register_worker))
        .route("/workers", get(workers::list_workers))
        .route("/workers/{id}/heartbeat", post(workers::heartbeat))
        // Scheduler
        .route("/scheduler/status", get(scheduler::get_status));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
