//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the scheduling orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Enable/disable the background loops.
    /// When disabled, ticks must be driven manually via `tick()`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// How often the scheduling loop runs (milliseconds).
    /// Each tick drains outcomes, then assigns queued tasks to workers.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Workers silent for longer than this are marked offline and their
    /// in-flight tasks requeued (seconds).
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,

    /// How often the heartbeat monitor sweeps for stale workers
    /// (milliseconds).
    #[serde(default = "default_heartbeat_sweep_interval")]
    pub heartbeat_sweep_interval_ms: u64,

    /// How often the scale advisory loop inspects backlog and aggregate
    /// spare capacity (milliseconds).
    #[serde(default = "default_advisory_interval")]
    pub scale_advisory_interval_ms: u64,

    /// Worker-scoring weight on the worker's historical performance score.
    #[serde(default = "default_perf_weight")]
    pub perf_weight: f64,

    /// Worker-scoring weight on resource fit tightness.
    #[serde(default = "default_resource_weight")]
    pub resource_weight: f64,

    /// Worker-scoring weight on task deadline urgency.
    #[serde(default = "default_deadline_weight")]
    pub deadline_weight: f64,

    /// Fraction of declared capacity kept free when filtering candidate
    /// workers (0.0-1.0).
    #[serde(default = "default_resource_buffer")]
    pub resource_buffer_pct: f64,

    /// Load ratio at which a worker is flagged overloaded and excluded
    /// from further assignment.
    #[serde(default = "default_overload_ratio")]
    pub overload_ratio: f64,

    /// Retry budget applied to tasks created by campaign decomposition.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,

    /// Consecutive capacity misses for a single High-or-above task before
    /// a scale-up advisory is emitted.
    #[serde(default = "default_scale_up_misses")]
    pub scale_up_after_misses: u32,

    /// Parallelization potential above which a campaign decomposes into
    /// independent per-product tasks instead of a sequential pipeline.
    #[serde(default = "default_parallelization_threshold")]
    pub parallelization_threshold: f64,

    /// Queue depth at which the advisory loop starts reporting aggregate
    /// resource shortfalls.
    #[serde(default = "default_backlog_threshold")]
    pub backlog_scale_threshold: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_tick_interval() -> u64 {
    1000 // 1 second
}

fn default_heartbeat_timeout() -> u64 {
    30
}

fn default_heartbeat_sweep_interval() -> u64 {
    5000 // 5 seconds
}

fn default_advisory_interval() -> u64 {
    10000 // 10 seconds
}

fn default_perf_weight() -> f64 {
    0.4
}

fn default_resource_weight() -> f64 {
    0.2
}

fn default_deadline_weight() -> f64 {
    0.4
}

fn default_resource_buffer() -> f64 {
    0.1
}

fn default_overload_ratio() -> f64 {
    0.9
}

fn default_max_retries() -> u32 {
    3
}

fn default_scale_up_misses() -> u32 {
    5
}

fn default_parallelization_threshold() -> f64 {
    0.7
}

fn default_backlog_threshold() -> usize {
    25
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            tick_interval_ms: default_tick_interval(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            heartbeat_sweep_interval_ms: default_heartbeat_sweep_interval(),
            scale_advisory_interval_ms: default_advisory_interval(),
            perf_weight: default_perf_weight(),
            resource_weight: default_resource_weight(),
            deadline_weight: default_deadline_weight(),
            resource_buffer_pct: default_resource_buffer(),
            overload_ratio: default_overload_ratio(),
            default_max_retries: default_max_retries(),
            scale_up_after_misses: default_scale_up_misses(),
            parallelization_threshold: default_parallelization_threshold(),
            backlog_scale_threshold: default_backlog_threshold(),
        }
    }
}
