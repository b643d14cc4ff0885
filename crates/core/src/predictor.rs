//! Duration and resource estimation for tasks.
//!
//! The estimates are coarse heuristics keyed on task type, brief complexity,
//! and variant count. They only need to be good enough for capacity planning;
//! a trained model can replace the constants without changing the interface.

use serde::{Deserialize, Serialize};

use crate::task::{ResourceKind, ResourceProfile, TaskType};

/// Predicted cost of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEstimate {
    pub duration_secs: u64,
    pub resources: ResourceProfile,
}

/// Heuristic performance predictor.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformancePredictor;

impl PerformancePredictor {
    pub fn new() -> Self {
        Self
    }

    /// Estimate duration and resource needs for one task.
    ///
    /// `complexity` is the 0-1 campaign complexity score; `variants` is the
    /// number of creative variants this particular task is responsible for.
    pub fn estimate(&self, task_type: TaskType, complexity: f64, variants: u32) -> TaskEstimate {
        let complexity = complexity.clamp(0.0, 1.0);
        let variants = variants.max(1);

        match task_type {
            TaskType::Planning => TaskEstimate {
                duration_secs: (300.0 + complexity * 600.0) as u64,
                resources: ResourceProfile::new()
                    .with(ResourceKind::Cpu, 0.2)
                    .with(ResourceKind::Memory, 0.2)
                    .with(ResourceKind::ApiQuota, 2.0),
            },
            TaskType::BulkGeneration | TaskType::ProductGeneration => TaskEstimate {
                duration_secs: (variants as f64 * (30.0 + complexity * 90.0)) as u64,
                resources: ResourceProfile::new()
                    .with(ResourceKind::Cpu, 0.3 + 0.3 * complexity)
                    .with(ResourceKind::Memory, 0.2 + 0.2 * complexity)
                    .with(ResourceKind::Gpu, 0.2 + 0.5 * complexity)
                    .with(ResourceKind::ApiQuota, variants as f64)
                    .with(ResourceKind::Network, 0.1),
            },
            TaskType::QualityAssurance => TaskEstimate {
                duration_secs: 60 + variants as u64 * 10,
                resources: ResourceProfile::new()
                    .with(ResourceKind::Cpu, 0.2)
                    .with(ResourceKind::Memory, 0.1)
                    .with(ResourceKind::ApiQuota, (variants as f64 / 2.0).ceil()),
            },
        }
    }
}
