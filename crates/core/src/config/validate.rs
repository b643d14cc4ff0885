use super::{
    types::{BackendKind, Config},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Scoring weights are in [0, 1] and sum to 1.0
/// - Buffer and overload ratios are sane fractions
/// - Webhook backend has a webhook section with a URL
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Orchestrator validation
    let orch = &config.orchestrator;
    if orch.tick_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.tick_interval_ms cannot be 0".to_string(),
        ));
    }
    for (name, value) in [
        ("perf_weight", orch.perf_weight),
        ("resource_weight", orch.resource_weight),
        ("deadline_weight", orch.deadline_weight),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::ValidationError(format!(
                "orchestrator.{} must be in [0, 1], got {}",
                name, value
            )));
        }
    }
    let weight_sum = orch.perf_weight + orch.resource_weight + orch.deadline_weight;
    if (weight_sum - 1.0).abs() > 1e-6 {
        return Err(ConfigError::ValidationError(format!(
            "orchestrator scoring weights must sum to 1.0, got {}",
            weight_sum
        )));
    }
    if !(0.0..1.0).contains(&orch.resource_buffer_pct) {
        return Err(ConfigError::ValidationError(format!(
            "orchestrator.resource_buffer_pct must be in [0, 1), got {}",
            orch.resource_buffer_pct
        )));
    }
    if !(0.0..=1.0).contains(&orch.overload_ratio) || orch.overload_ratio == 0.0 {
        return Err(ConfigError::ValidationError(format!(
            "orchestrator.overload_ratio must be in (0, 1], got {}",
            orch.overload_ratio
        )));
    }
    if !(0.0..=1.0).contains(&orch.parallelization_threshold) {
        return Err(ConfigError::ValidationError(format!(
            "orchestrator.parallelization_threshold must be in [0, 1], got {}",
            orch.parallelization_threshold
        )));
    }

    // Backend validation
    if config.backend.kind == BackendKind::Webhook {
        match &config.backend.webhook {
            Some(webhook) if !webhook.url.is_empty() => {}
            _ => {
                return Err(ConfigError::ValidationError(
                    "backend.kind = \"webhook\" requires backend.webhook.url".to_string(),
                ));
            }
        }
    }

    Ok(())
}
