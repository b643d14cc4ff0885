//! Scheduling orchestrator.
//!
//! Three background loops drive the system:
//! - **Scheduling**: drain outcomes, assign queued tasks to workers
//! - **Heartbeat monitor**: offline silent workers, requeue their tasks
//! - **Scale advisory**: report resource shortfalls on deep backlogs

mod config;
mod decompose;
mod runner;
mod selector;
mod types;

pub use config::OrchestratorConfig;
pub use decompose::{base_priority, decompose_campaign};
pub use runner::Orchestrator;
pub use selector::{find_optimal_worker, resource_efficiency, score_worker};
pub use types::{
    CampaignStatus, EventCallback, SchedulerError, SchedulerEvent, SchedulerStatus, TaskOutcome,
};
