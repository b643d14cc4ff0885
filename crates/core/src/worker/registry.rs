//! Worker registry with load accounting.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::task::{ResourceProfile, Task};

use super::types::{WorkerNode, WorkerStatus, WorkerUtilization};

/// Errors raised by worker registry operations.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Worker not registered.
    #[error("worker not found: {0}")]
    NotFound(String),

    /// Reservation would exceed capacity in some dimension.
    #[error("worker {worker_id} has no capacity for resource {resource}")]
    CapacityExceeded { worker_id: String, resource: String },

    /// Releasing more load than was reserved. Indicates a programming error
    /// in the assign/release pairing; the worker is quarantined.
    #[error("load accounting corrupted on worker {worker_id} (resource {resource})")]
    LoadCorruption { worker_id: String, resource: String },
}

/// Registry of worker nodes.
///
/// The registry is one of the two pieces of mutable shared state in the
/// scheduler (the other is the task table); every mutation goes through this
/// single lock so concurrent readers always see a consistent snapshot.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: RwLock<HashMap<String, WorkerNode>>,
    /// Load ratio at which a worker is flagged overloaded and stops
    /// receiving assignments.
    overload_ratio: f64,
}

impl WorkerRegistry {
    pub fn new(overload_ratio: f64) -> Self {
        Self {
            workers: RwLock::new(HashMap::new()),
            overload_ratio,
        }
    }

    /// Register a worker, or refresh capabilities/capacity on re-register.
    pub async fn register(
        &self,
        worker_id: impl Into<String>,
        capabilities: impl IntoIterator<Item = String>,
        max_capacity: ResourceProfile,
    ) {
        let worker_id = worker_id.into();
        let mut workers = self.workers.write().await;
        match workers.get_mut(&worker_id) {
            Some(existing) => {
                existing.capabilities = capabilities.into_iter().collect();
                existing.max_capacity = max_capacity;
                existing.last_heartbeat = Utc::now();
                if existing.status == WorkerStatus::Offline {
                    existing.status = if existing.active_tasks.is_empty() {
                        WorkerStatus::Idle
                    } else {
                        WorkerStatus::Busy
                    };
                }
                info!("Worker {} re-registered", worker_id);
            }
            None => {
                let worker = WorkerNode::new(
                    worker_id.clone(),
                    capabilities.into_iter().collect(),
                    max_capacity,
                    Utc::now(),
                );
                workers.insert(worker_id.clone(), worker);
                info!("Worker {} registered", worker_id);
            }
        }
    }

    /// Record a heartbeat. A worker previously marked offline comes back as
    /// idle (its tasks were already requeued by the offline sweep).
    ///
    /// The reported load is advisory only; the orchestrator's own accounting
    /// is authoritative. A large divergence is logged as it suggests the
    /// worker is doing work this scheduler never assigned.
    pub async fn heartbeat(
        &self,
        worker_id: &str,
        reported_load: Option<ResourceProfile>,
    ) -> Result<(), WorkerError> {
        let mut workers = self.workers.write().await;
        let worker = workers
            .get_mut(worker_id)
            .ok_or_else(|| WorkerError::NotFound(worker_id.to_string()))?;

        worker.last_heartbeat = Utc::now();
        if worker.status == WorkerStatus::Offline {
            worker.status = WorkerStatus::Idle;
            info!("Worker {} back online", worker_id);
        }

        if let Some(reported) = reported_load {
            for (kind, amount) in reported.iter() {
                let tracked = worker.current_load.get(kind);
                if (amount - tracked).abs() > 0.25 {
                    warn!(
                        "Worker {} reports {} {:.2} but scheduler tracks {:.2}",
                        worker_id,
                        kind.as_label(),
                        amount,
                        tracked
                    );
                }
            }
        }

        Ok(())
    }

    /// Reserve the task's resource requirements on a worker and record the
    /// task as active. Must be paired with exactly one `release`.
    pub async fn reserve(&self, worker_id: &str, task: &Task) -> Result<(), WorkerError> {
        let mut workers = self.workers.write().await;
        let worker = workers
            .get_mut(worker_id)
            .ok_or_else(|| WorkerError::NotFound(worker_id.to_string()))?;

        if !task
            .resource_requirements
            .fits_within(&worker.current_load, &worker.max_capacity)
        {
            let resource = task
                .resource_requirements
                .iter()
                .find(|(kind, amount)| {
                    worker.current_load.get(*kind) + amount > worker.max_capacity.get(*kind)
                })
                .map(|(kind, _)| kind.as_label().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(WorkerError::CapacityExceeded {
                worker_id: worker_id.to_string(),
                resource,
            });
        }

        worker.current_load.add(&task.resource_requirements);
        worker.active_tasks.insert(task.id);
        worker.status = if worker.total_load_ratio() >= self.overload_ratio {
            WorkerStatus::Overloaded
        } else {
            WorkerStatus::Busy
        };
        Ok(())
    }

    /// Release a previous reservation. On accounting corruption (the release
    /// would drive load negative) the worker is quarantined offline rather
    /// than left with untrustworthy numbers.
    pub async fn release(&self, worker_id: &str, task: &Task) -> Result<(), WorkerError> {
        let mut workers = self.workers.write().await;
        let worker = workers
            .get_mut(worker_id)
            .ok_or_else(|| WorkerError::NotFound(worker_id.to_string()))?;

        worker.active_tasks.remove(&task.id);

        if let Err(kind) = worker.current_load.checked_sub(&task.resource_requirements) {
            error!(
                "Load accounting corrupted on worker {}: releasing task {} would drive {} negative; quarantining worker",
                worker_id,
                task.id,
                kind.as_label()
            );
            worker.status = WorkerStatus::Offline;
            return Err(WorkerError::LoadCorruption {
                worker_id: worker_id.to_string(),
                resource: kind.as_label().to_string(),
            });
        }

        if worker.status != WorkerStatus::Offline {
            worker.status = if worker.active_tasks.is_empty() {
                WorkerStatus::Idle
            } else if worker.total_load_ratio() >= self.overload_ratio {
                WorkerStatus::Overloaded
            } else {
                WorkerStatus::Busy
            };
        }
        Ok(())
    }

    /// Nudge a worker's rolling performance score toward the observed
    /// outcome quality (1.0 = nominal).
    pub async fn record_performance(&self, worker_id: &str, observation: f64) {
        let mut workers = self.workers.write().await;
        if let Some(worker) = workers.get_mut(worker_id) {
            // Exponential moving average, biased toward history.
            worker.performance_score = worker.performance_score * 0.8 + observation * 0.2;
        }
    }

    /// Mark workers silent past the heartbeat timeout as offline and strip
    /// their active tasks and load. Returns the orphaned task ids per worker
    /// so the caller can requeue them without consuming retries.
    pub async fn sweep_stale(
        &self,
        timeout: Duration,
        now: DateTime<Utc>,
    ) -> Vec<(String, Vec<Uuid>)> {
        let mut workers = self.workers.write().await;
        let mut orphaned = Vec::new();

        for worker in workers.values_mut() {
            if worker.status == WorkerStatus::Offline {
                continue;
            }
            if now - worker.last_heartbeat > timeout {
                warn!(
                    "Worker {} silent for {}s, marking offline",
                    worker.id,
                    (now - worker.last_heartbeat).num_seconds()
                );
                worker.status = WorkerStatus::Offline;
                let tasks: Vec<Uuid> = worker.active_tasks.drain().collect();
                worker.current_load = ResourceProfile::new();
                if !tasks.is_empty() {
                    orphaned.push((worker.id.clone(), tasks));
                }
            }
        }

        orphaned
    }

    /// Clones of all workers currently eligible for assignment.
    pub async fn schedulable_workers(&self) -> Vec<WorkerNode> {
        let workers = self.workers.read().await;
        workers
            .values()
            .filter(|w| w.status.is_schedulable())
            .cloned()
            .collect()
    }

    pub async fn get(&self, worker_id: &str) -> Option<WorkerNode> {
        self.workers.read().await.get(worker_id).cloned()
    }

    /// Utilization snapshot for dashboards and the scale advisory loop.
    pub async fn utilization(&self) -> Vec<WorkerUtilization> {
        let workers = self.workers.read().await;
        let mut snapshot: Vec<WorkerUtilization> =
            workers.values().map(WorkerUtilization::from).collect();
        snapshot.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));
        snapshot
    }

    /// Spare capacity per resource kind summed over schedulable workers.
    pub async fn aggregate_spare_capacity(&self) -> ResourceProfile {
        let workers = self.workers.read().await;
        let mut spare = ResourceProfile::new();
        for worker in workers.values().filter(|w| w.status.is_schedulable()) {
            for (kind, capacity) in worker.max_capacity.iter() {
                let free = (capacity - worker.current_load.get(kind)).max(0.0);
                spare.set(kind, spare.get(kind) + free);
            }
        }
        spare
    }

    pub async fn counts(&self) -> (usize, usize) {
        let workers = self.workers.read().await;
        let online = workers
            .values()
            .filter(|w| w.status != WorkerStatus::Offline)
            .count();
        (online, workers.len() - online)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{ResourceKind, TaskPriority, TaskType};

    fn cpu_task(amount: f64) -> Task {
        Task::new(
            Uuid::new_v4(),
            TaskType::Planning,
            TaskPriority::Normal,
            Utc::now(),
        )
        .with_requirements(ResourceProfile::new().with(ResourceKind::Cpu, amount))
    }

    async fn registry_with_worker(capacity: f64) -> WorkerRegistry {
        let registry = WorkerRegistry::new(0.9);
        registry
            .register(
                "w1",
                Vec::<String>::new(),
                ResourceProfile::new().with(ResourceKind::Cpu, capacity),
            )
            .await;
        registry
    }

    #[tokio::test]
    async fn test_reserve_release_conserves_load() {
        let registry = registry_with_worker(2.0).await;
        let tasks: Vec<Task> = (0..3).map(|_| cpu_task(0.5)).collect();

        for task in &tasks {
            registry.reserve("w1", task).await.unwrap();
        }
        let loaded = registry.get("w1").await.unwrap();
        assert!((loaded.current_load.get(ResourceKind::Cpu) - 1.5).abs() < 1e-9);
        assert_eq!(loaded.active_tasks.len(), 3);

        for task in &tasks {
            registry.release("w1", task).await.unwrap();
        }
        let drained = registry.get("w1").await.unwrap();
        assert!(drained.current_load.get(ResourceKind::Cpu).abs() < 1e-9);
        assert!(drained.active_tasks.is_empty());
        assert_eq!(drained.status, WorkerStatus::Idle);
    }

    #[tokio::test]
    async fn test_reserve_rejects_over_capacity() {
        let registry = registry_with_worker(1.0).await;
        registry.reserve("w1", &cpu_task(0.9)).await.unwrap();

        let err = registry.reserve("w1", &cpu_task(0.2)).await.unwrap_err();
        assert!(matches!(err, WorkerError::CapacityExceeded { .. }));
    }

    #[tokio::test]
    async fn test_double_release_quarantines_worker() {
        let registry = registry_with_worker(1.0).await;
        let task = cpu_task(0.5);
        registry.reserve("w1", &task).await.unwrap();
        registry.release("w1", &task).await.unwrap();

        let err = registry.release("w1", &task).await.unwrap_err();
        assert!(matches!(err, WorkerError::LoadCorruption { .. }));
        assert_eq!(
            registry.get("w1").await.unwrap().status,
            WorkerStatus::Offline
        );
    }

    #[tokio::test]
    async fn test_overload_status_threshold() {
        let registry = registry_with_worker(1.0).await;
        registry.reserve("w1", &cpu_task(0.95)).await.unwrap();
        assert_eq!(
            registry.get("w1").await.unwrap().status,
            WorkerStatus::Overloaded
        );
    }

    #[tokio::test]
    async fn test_sweep_stale_orphans_tasks() {
        let registry = registry_with_worker(1.0).await;
        let task = cpu_task(0.5);
        registry.reserve("w1", &task).await.unwrap();

        let orphaned = registry
            .sweep_stale(Duration::seconds(30), Utc::now() + Duration::seconds(60))
            .await;
        assert_eq!(orphaned.len(), 1);
        assert_eq!(orphaned[0].0, "w1");
        assert_eq!(orphaned[0].1, vec![task.id]);

        let worker = registry.get("w1").await.unwrap();
        assert_eq!(worker.status, WorkerStatus::Offline);
        assert!(worker.current_load.get(ResourceKind::Cpu).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_heartbeat_revives_offline_worker() {
        let registry = registry_with_worker(1.0).await;
        registry
            .sweep_stale(Duration::seconds(0), Utc::now() + Duration::seconds(60))
            .await;
        assert_eq!(
            registry.get("w1").await.unwrap().status,
            WorkerStatus::Offline
        );

        registry.heartbeat("w1", None).await.unwrap();
        assert_eq!(registry.get("w1").await.unwrap().status, WorkerStatus::Idle);
    }

    #[tokio::test]
    async fn test_heartbeat_unknown_worker() {
        let registry = WorkerRegistry::new(0.9);
        let err = registry.heartbeat("ghost", None).await.unwrap_err();
        assert!(matches!(err, WorkerError::NotFound(_)));
    }
}
