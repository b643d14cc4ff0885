//! Core scheduling engine for the Atelier creative-asset pipeline.
//!
//! Campaigns decompose into tasks, tasks wait in a priority queue, and the
//! orchestrator matches them to resource-bounded workers and tracks them to a
//! terminal status. The server crate exposes this over HTTP.

pub mod backend;
pub mod campaign;
pub mod config;
pub mod deadline;
pub mod metrics;
pub mod optimizer;
pub mod orchestrator;
pub mod predictor;
pub mod task;
pub mod testing;
pub mod worker;

pub use backend::{BackendError, GenerationBackend, LogBackend, WebhookBackend, WebhookConfig};
pub use campaign::{CampaignBrief, CampaignMetadata, ClientTier};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use orchestrator::{
    CampaignStatus, EventCallback, Orchestrator, OrchestratorConfig, SchedulerError,
    SchedulerEvent, SchedulerStatus, TaskOutcome,
};
pub use task::{ResourceKind, ResourceProfile, Task, TaskPriority, TaskStatus, TaskType};
pub use worker::{WorkerError, WorkerNode, WorkerRegistry, WorkerStatus, WorkerUtilization};
