//! Worker selection.
//!
//! Scores every worker that can take a task and picks the best. Scoring is a
//! weighted blend of historical performance, resource fit tightness, and the
//! task's deadline urgency; ties go to the least-loaded worker.

use chrono::{DateTime, Utc};

use crate::deadline::deadline_urgency;
use crate::task::Task;
use crate::worker::WorkerNode;

use super::config::OrchestratorConfig;

/// How tightly the task's requirements fill the worker's spare capacity,
/// averaged over the required dimensions. 1.0 is a perfect fit, values near
/// zero mean the worker is heavily oversized for this task.
pub fn resource_efficiency(task: &Task, worker: &WorkerNode) -> f64 {
    let mut ratios = Vec::new();
    for (kind, required) in task.resource_requirements.iter() {
        if required <= 0.0 {
            continue;
        }
        let spare = worker.max_capacity.get(kind) - worker.current_load.get(kind);
        if spare <= 0.0 {
            // Candidates are pre-filtered by can_handle, so this only happens
            // on a zero-requirement dimension racing a concurrent reserve.
            continue;
        }
        ratios.push((required / spare).min(1.0));
    }
    if ratios.is_empty() {
        return 0.0;
    }
    ratios.iter().sum::<f64>() / ratios.len() as f64
}

/// Composite score of assigning `task` to `worker`.
pub fn score_worker(
    task: &Task,
    worker: &WorkerNode,
    config: &OrchestratorConfig,
    now: DateTime<Utc>,
) -> f64 {
    config.perf_weight * worker.performance_score
        + config.resource_weight * resource_efficiency(task, worker)
        + config.deadline_weight * deadline_urgency(task, now)
}

/// Pick the best worker for a task among the given candidates.
///
/// Returns `None` when no candidate can handle the task (a capacity miss).
/// Equal scores are broken by the lowest total load ratio so assignments
/// spread across the fleet.
pub fn find_optimal_worker<'a>(
    task: &Task,
    candidates: &'a [WorkerNode],
    config: &OrchestratorConfig,
    now: DateTime<Utc>,
) -> Option<&'a WorkerNode> {
    let mut best: Option<(&WorkerNode, f64)> = None;

    for worker in candidates {
        if !worker.can_handle(task, config.resource_buffer_pct) {
            continue;
        }
        let score = score_worker(task, worker, config, now);
        best = match best {
            None => Some((worker, score)),
            Some((current, current_score)) => {
                if score > current_score
                    || (score == current_score
                        && worker.total_load_ratio() < current.total_load_ratio())
                {
                    Some((worker, score))
                } else {
                    Some((current, current_score))
                }
            }
        };
    }

    best.map(|(worker, _)| worker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{ResourceKind, ResourceProfile, TaskPriority, TaskType};
    use chrono::Duration;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn worker(id: &str, cpu_capacity: f64, cpu_load: f64) -> WorkerNode {
        let mut w = WorkerNode::new(
            id,
            ["image_generation".to_string()].into(),
            ResourceProfile::new().with(ResourceKind::Cpu, cpu_capacity),
            Utc::now(),
        );
        w.current_load.set(ResourceKind::Cpu, cpu_load);
        w
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
    fn test_resource_efficiency_rewards_tight_fit() {
        let task = cpu_task(0.5);
        let tight = worker("tight", 0.6, 0.0);
        let oversized = worker("oversized", 8.0, 0.0);

        assert!(resource_efficiency(&task, &tight) > resource_efficiency(&task, &oversized));
    }

    #[test]
    fn test_find_optimal_prefers_higher_performance() {
        let task = cpu_task(0.2);
        let mut fast = worker("fast", 1.0, 0.0);
        fast.performance_score = 1.5;
        let slow = worker("slow", 1.0, 0.0);

        let candidates = vec![slow, fast];
        let config = OrchestratorConfig::default();
        let chosen = find_optimal_worker(&task, &candidates, &config, Utc::now()).unwrap();
        assert_eq!(chosen.id, "fast");
    }

    #[test]
    fn test_find_optimal_skips_full_workers() {
        let task = cpu_task(0.5);
        let full = worker("full", 1.0, 0.9);
        let free = worker("free", 1.0, 0.0);

        let candidates = vec![full, free];
        let config = OrchestratorConfig::default();
        let chosen = find_optimal_worker(&task, &candidates, &config, Utc::now()).unwrap();
        assert_eq!(chosen.id, "free");
    }

    #[test]
    fn test_find_optimal_none_when_nothing_fits() {
        let task = cpu_task(2.0);
        let candidates = vec![worker("small", 1.0, 0.0)];
        let config = OrchestratorConfig::default();
        assert!(find_optimal_worker(&task, &candidates, &config, Utc::now()).is_none());
    }

    #[test]
    fn test_tie_broken_by_lower_load() {
        // Two identical workers except one carries unrelated gpu load.
        let now = Utc::now();
        let task = cpu_task(0.2);

        let idle = worker("idle", 1.0, 0.0);
        let mut loaded = worker("loaded", 1.0, 0.0);
        loaded.max_capacity.set(ResourceKind::Gpu, 1.0);
        loaded.current_load.set(ResourceKind::Gpu, 0.8);
        // Give idle the same gpu capacity so cpu efficiency matches.
        let mut idle = idle;
        idle.max_capacity.set(ResourceKind::Gpu, 1.0);

        let candidates = vec![loaded, idle];
        let config = OrchestratorConfig::default();
        let chosen = find_optimal_worker(&task, &candidates, &config, now).unwrap();
        assert_eq!(chosen.id, "idle");
    }

    #[test]
    fn test_urgent_deadline_raises_score() {
        let now = Utc::now();
        let w = worker("w", 1.0, 0.0);
        let config = OrchestratorConfig::default();

        let urgent = cpu_task(0.2).with_deadline(Some(now + Duration::hours(2)));
        let relaxed = cpu_task(0.2).with_deadline(Some(now + Duration::hours(200)));

        assert!(score_worker(&urgent, &w, &config, now) > score_worker(&relaxed, &w, &config, now));
    }

    #[test]
    fn test_capability_mismatch_is_a_miss() {
        let task = cpu_task(0.1);
        let mut w = worker("w", 1.0, 0.0);
        w.capabilities = HashSet::new();

        let config = OrchestratorConfig::default();
        assert!(find_optimal_worker(&task, &[w], &config, Utc::now()).is_none());
    }
}
