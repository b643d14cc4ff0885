//! Prometheus metrics for the scheduler core.
//!
//! This module provides metrics for:
//! - Task flow (submitted, assigned, terminal outcomes, retries)
//! - Scheduling loop (tick latency, capacity misses, scale-up requests)
//! - Queue and worker gauges

use once_cell::sync::Lazy;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
};

// =============================================================================
// Task Flow
// =============================================================================

/// Tasks submitted total.
pub static TASKS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("atelier_tasks_submitted_total", "Total tasks submitted").unwrap()
});

/// Campaigns submitted total.
pub static CAMPAIGNS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "atelier_campaigns_submitted_total",
        "Total campaigns submitted",
    )
    .unwrap()
});

/// Task assignments total.
pub static TASKS_ASSIGNED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "atelier_tasks_assigned_total",
        "Total task-to-worker assignments",
    )
    .unwrap()
});

/// Tasks reaching a terminal status, by status.
pub static TASKS_TERMINAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "atelier_tasks_terminal_total",
            "Tasks reaching a terminal status",
        ),
        &["status"], // "completed", "failed", "cancelled"
    )
    .unwrap()
});

/// Retry attempts total.
pub static TASK_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("atelier_task_retries_total", "Total task retry attempts").unwrap()
});

/// Tasks requeued after their worker went offline.
pub static TASKS_REQUEUED_OFFLINE: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "atelier_tasks_requeued_offline_total",
        "Tasks requeued because their worker went offline",
    )
    .unwrap()
});

/// Task execution duration in seconds, by task type.
pub static TASK_EXECUTION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "atelier_task_execution_duration_seconds",
            "Wall time from assignment to terminal status",
        )
        .buckets(vec![
            1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
        ]),
        &["task_type"],
    )
    .unwrap()
});

// =============================================================================
// Scheduling Loop
// =============================================================================

/// Scheduling tick duration in seconds.
pub static TICK_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "atelier_tick_duration_seconds",
            "Duration of one scheduling tick",
        )
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
    )
    .unwrap()
});

/// Scheduling attempts that found no fitting worker.
pub static CAPACITY_MISSES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "atelier_capacity_misses_total",
        "Scheduling attempts with no fitting worker",
    )
    .unwrap()
});

/// Scale-up advisories emitted, by resource kind.
pub static SCALE_UP_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "atelier_scale_up_requests_total",
            "Scale-up advisories emitted",
        ),
        &["resource"],
    )
    .unwrap()
});

// =============================================================================
// Gauges
// =============================================================================

/// Current queue depth.
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("atelier_queue_depth", "Tasks currently queued").unwrap()
});

/// Tasks currently in flight (assigned or in progress).
pub static TASKS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "atelier_tasks_in_flight",
        "Tasks currently assigned or in progress",
    )
    .unwrap()
});

/// Workers by status.
pub static WORKERS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("atelier_workers_by_status", "Worker count by status"),
        &["status"],
    )
    .unwrap()
});

/// Scheduler running state (1 = running, 0 = stopped).
pub static SCHEDULER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "atelier_scheduler_running",
        "Whether the scheduling loops are running (1) or stopped (0)",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TASKS_SUBMITTED.clone()),
        Box::new(CAMPAIGNS_SUBMITTED.clone()),
        Box::new(TASKS_ASSIGNED.clone()),
        Box::new(TASKS_TERMINAL.clone()),
        Box::new(TASK_RETRIES.clone()),
        Box::new(TASKS_REQUEUED_OFFLINE.clone()),
        Box::new(TASK_EXECUTION_DURATION.clone()),
        Box::new(TICK_DURATION.clone()),
        Box::new(CAPACITY_MISSES.clone()),
        Box::new(SCALE_UP_REQUESTS.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(TASKS_IN_FLIGHT.clone()),
        Box::new(WORKERS_BY_STATUS.clone()),
        Box::new(SCHEDULER_RUNNING.clone()),
    ]
}
