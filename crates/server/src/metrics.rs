//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the Atelier server:
//! - HTTP request metrics (latency, counts, errors)
//! - Scheduler status gauges (collected dynamically)
//!
//! Core scheduling metrics live in `atelier_core::metrics` and are registered
//! into the same registry here.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "atelier_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("atelier_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "atelier_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Core metrics (task flow, scheduling loop, queue/worker gauges)
    for metric in atelier_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the scheduler gauges reflect the current
/// snapshot even between ticks.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    use atelier_core::metrics::{QUEUE_DEPTH, SCHEDULER_RUNNING, TASKS_IN_FLIGHT};

    let status = state.orchestrator().status().await;
    SCHEDULER_RUNNING.set(if status.running { 1 } else { 0 });
    QUEUE_DEPTH.set(status.queued_count as i64);
    TASKS_IN_FLIGHT.set(status.in_flight_count as i64);
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = uuid_regex.replace_all(path, "{id}");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/tasks/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/tasks/{id}");
    }

    #[test]
    fn test_normalize_path_uuid_middle() {
        let path = "/api/v1/tasks/550e8400-e29b-41d4-a716-446655440000/outcome";
        assert_eq!(normalize_path(path), "/api/v1/tasks/{id}/outcome");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/v1/workers/42/heartbeat";
        assert_eq!(normalize_path(path), "/api/v1/workers/{id}/heartbeat");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/health";
        assert_eq!(normalize_path(path), "/api/v1/health");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        // Access metrics to ensure they're initialized
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("atelier_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        // Touch metrics so they appear in output (Prometheus only outputs
        // metrics that have been accessed)
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        atelier_core::metrics::SCHEDULER_RUNNING.set(0);
        atelier_core::metrics::QUEUE_DEPTH.set(0);
        atelier_core::metrics::TASKS_SUBMITTED.inc();

        let output = encode_metrics();

        assert!(output.contains("atelier_http_request_duration_seconds"));
        assert!(output.contains("atelier_http_requests_in_flight"));
        assert!(output.contains("atelier_scheduler_running"));
        assert!(output.contains("atelier_queue_depth"));
        assert!(output.contains("atelier_tasks_submitted_total"));
    }
}
