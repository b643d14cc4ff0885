//! Worker data types.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::{ResourceProfile, Task};

/// Liveness/availability state of a worker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Busy,
    Overloaded,
    Offline,
}

impl WorkerStatus {
    /// Only idle and busy workers accept new assignments.
    pub fn is_schedulable(&self) -> bool {
        matches!(self, WorkerStatus::Idle | WorkerStatus::Busy)
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Busy => "busy",
            WorkerStatus::Overloaded => "overloaded",
            WorkerStatus::Offline => "offline",
        }
    }
}

/// One resource-bounded execution unit.
///
/// Load accounting is owned by the orchestrator: `current_load` is the sum of
/// the requirements of tasks in `active_tasks`, incremented on assignment and
/// decremented exactly once on release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerNode {
    pub id: String,
    pub status: WorkerStatus,
    /// Declared feature flags (e.g. "image_generation", "quality_checks").
    pub capabilities: HashSet<String>,
    pub current_load: ResourceProfile,
    pub max_capacity: ResourceProfile,
    pub active_tasks: HashSet<Uuid>,
    /// Rolling quality/speed multiplier, default 1.0.
    pub performance_score: f64,
    pub last_heartbeat: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
}

impl WorkerNode {
    pub fn new(
        id: impl Into<String>,
        capabilities: HashSet<String>,
        max_capacity: ResourceProfile,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            status: WorkerStatus::Idle,
            capabilities,
            current_load: ResourceProfile::new(),
            max_capacity,
            active_tasks: HashSet::new(),
            performance_score: 1.0,
            last_heartbeat: now,
            registered_at: now,
        }
    }

    /// Whether this worker can take the task right now: schedulable status,
    /// capability superset, and room in every required resource dimension.
    ///
    /// `capacity_buffer` shaves a fraction off the declared capacity to keep
    /// headroom for load reported between heartbeats.
    pub fn can_handle(&self, task: &Task, capacity_buffer: f64) -> bool {
        if !self.status.is_schedulable() {
            return false;
        }
        if !task
            .required_capabilities
            .iter()
            .all(|cap| self.capabilities.contains(cap))
        {
            return false;
        }
        let effective_capacity = self.max_capacity.scaled(1.0 - capacity_buffer);
        task.resource_requirements
            .fits_within(&self.current_load, &effective_capacity)
    }

    /// Average load/capacity ratio across dimensions with declared capacity.
    /// Used as the tie-breaker favoring underused workers.
    pub fn total_load_ratio(&self) -> f64 {
        let mut ratios = Vec::new();
        for (kind, capacity) in self.max_capacity.iter() {
            if capacity > 0.0 {
                ratios.push(self.current_load.get(kind) / capacity);
            }
        }
        if ratios.is_empty() {
            return 0.0;
        }
        ratios.iter().sum::<f64>() / ratios.len() as f64
    }
}

/// Read-only utilization snapshot of one worker, for dashboards and the
/// scale advisory loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerUtilization {
    pub worker_id: String,
    pub status: WorkerStatus,
    pub active_tasks: usize,
    pub load_ratio: f64,
    pub performance_score: f64,
    pub last_heartbeat: DateTime<Utc>,
}

impl From<&WorkerNode> for WorkerUtilization {
    fn from(worker: &WorkerNode) -> Self {
        Self {
            worker_id: worker.id.clone(),
            status: worker.status,
            active_tasks: worker.active_tasks.len(),
            load_ratio: worker.total_load_ratio(),
            performance_score: worker.performance_score,
            last_heartbeat: worker.last_heartbeat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{ResourceKind, TaskPriority, TaskType};

    fn worker_with_cpu(load: f64, capacity: f64) -> WorkerNode {
        let mut worker = WorkerNode::new(
            "w1",
            ["image_generation".to_string()].into(),
            ResourceProfile::new().with(ResourceKind::Cpu, capacity),
            Utc::now(),
        );
        worker.current_load.set(ResourceKind::Cpu, load);
        worker
    }

    fn cpu_task(amount: f64) -> Task {
        Task::new(
            Uuid::new_v4(),
            TaskType::ProductGeneration,
            TaskPriority::Normal,
            Utc::now(),
        )
        .with_requirements(ResourceProfile::new().with(ResourceKind::Cpu, amount))
    }

    #[test]
    fn test_can_handle_rejects_over_capacity() {
        // cpu capacity 1.0, load 0.9: a 0.2 cpu task must be excluded.
        let worker = worker_with_cpu(0.9, 1.0);
        assert!(!worker.can_handle(&cpu_task(0.2), 0.0));
        assert!(worker.can_handle(&cpu_task(0.1), 0.0));
    }

    #[test]
    fn test_can_handle_respects_capability_superset() {
        let mut worker = worker_with_cpu(0.0, 1.0);
        worker.capabilities.clear();
        assert!(!worker.can_handle(&cpu_task(0.1), 0.0));
    }

    #[test]
    fn test_can_handle_rejects_offline_worker() {
        let mut worker = worker_with_cpu(0.0, 1.0);
        worker.status = WorkerStatus::Offline;
        assert!(!worker.can_handle(&cpu_task(0.1), 0.0));
    }

    #[test]
    fn test_capacity_buffer_shrinks_effective_capacity() {
        let worker = worker_with_cpu(0.8, 1.0);
        assert!(worker.can_handle(&cpu_task(0.15), 0.0));
        // With a 10% buffer the effective cpu capacity is 0.9.
        assert!(!worker.can_handle(&cpu_task(0.15), 0.1));
    }

    #[test]
    fn test_total_load_ratio() {
        let mut worker = WorkerNode::new(
            "w2",
            HashSet::new(),
            ResourceProfile::new()
                .with(ResourceKind::Cpu, 1.0)
                .with(ResourceKind::Gpu, 2.0),
            Utc::now(),
        );
        worker.current_load.set(ResourceKind::Cpu, 0.5);
        worker.current_load.set(ResourceKind::Gpu, 1.0);
        assert!((worker.total_load_ratio() - 0.5).abs() < 1e-9);
    }
}
