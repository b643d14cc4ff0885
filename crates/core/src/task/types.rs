//! Core task data types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default retry budget for a task.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// One dimension of schedulable capacity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// CPU share (fraction of one worker's CPU budget).
    Cpu,
    /// Memory share.
    Memory,
    /// GPU share.
    Gpu,
    /// External API quota units (absolute).
    ApiQuota,
    /// Network share.
    Network,
}

impl ResourceKind {
    /// All resource kinds, in a stable order.
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Cpu,
        ResourceKind::Memory,
        ResourceKind::Gpu,
        ResourceKind::ApiQuota,
        ResourceKind::Network,
    ];

    /// Returns the kind as a metric label.
    pub fn as_label(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
            ResourceKind::Gpu => "gpu",
            ResourceKind::ApiQuota => "api_quota",
            ResourceKind::Network => "network",
        }
    }
}

/// Per-kind resource amounts (requirements, load, or capacity).
///
/// Absent kinds are treated as zero. Subtraction is checked so that load
/// accounting errors surface instead of silently producing negative load.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceProfile {
    #[serde(flatten)]
    amounts: HashMap<ResourceKind, f64>,
}

impl ResourceProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, kind: ResourceKind, amount: f64) -> Self {
        self.amounts.insert(kind, amount);
        self
    }

    pub fn set(&mut self, kind: ResourceKind, amount: f64) {
        self.amounts.insert(kind, amount);
    }

    pub fn get(&self, kind: ResourceKind) -> f64 {
        self.amounts.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    /// Iterate over the kinds with a non-zero amount.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, f64)> + '_ {
        self.amounts.iter().map(|(k, v)| (*k, *v))
    }

    /// Add every amount from `other` into self.
    pub fn add(&mut self, other: &ResourceProfile) {
        for (kind, amount) in other.iter() {
            *self.amounts.entry(kind).or_insert(0.0) += amount;
        }
    }

    /// Subtract every amount from `other`, failing on the first kind that
    /// would go negative. On failure self is left unmodified.
    pub fn checked_sub(&mut self, other: &ResourceProfile) -> Result<(), ResourceKind> {
        const EPSILON: f64 = 1e-9;
        for (kind, amount) in other.iter() {
            if self.get(kind) - amount < -EPSILON {
                return Err(kind);
            }
        }
        for (kind, amount) in other.iter() {
            let entry = self.amounts.entry(kind).or_insert(0.0);
            *entry = (*entry - amount).max(0.0);
        }
        Ok(())
    }

    /// Scale every amount by a factor.
    pub fn scaled(&self, factor: f64) -> ResourceProfile {
        ResourceProfile {
            amounts: self.amounts.iter().map(|(k, v)| (*k, v * factor)).collect(),
        }
    }

    /// True when, for every kind required here, `load + self <= capacity`.
    pub fn fits_within(&self, load: &ResourceProfile, capacity: &ResourceProfile) -> bool {
        const EPSILON: f64 = 1e-9;
        self.iter()
            .all(|(kind, amount)| load.get(kind) + amount <= capacity.get(kind) + EPSILON)
    }
}

/// Scheduling priority. Lower ordinal is scheduled first.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Emergency = 0,
    Urgent = 1,
    High = 2,
    Normal = 3,
    Low = 4,
}

impl TaskPriority {
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    /// Priorities at or above High trigger scale-up advisories on repeated
    /// capacity misses.
    pub fn is_high_or_above(&self) -> bool {
        matches!(
            self,
            TaskPriority::Emergency | TaskPriority::Urgent | TaskPriority::High
        )
    }
}

/// Kind of creative work a task performs. Closed set so task-type driven
/// behavior is exhaustively matched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Campaign planning stage of a sequential pipeline.
    Planning,
    /// Bulk variant generation stage.
    BulkGeneration,
    /// Quality assurance stage.
    QualityAssurance,
    /// Standalone per-product generation (parallel decomposition).
    ProductGeneration,
}

impl TaskType {
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskType::Planning => "planning",
            TaskType::BulkGeneration => "bulk_generation",
            TaskType::QualityAssurance => "quality_assurance",
            TaskType::ProductGeneration => "product_generation",
        }
    }

    /// Worker capabilities this task type requires.
    pub fn required_capabilities(&self) -> Vec<String> {
        match self {
            TaskType::Planning => vec![],
            TaskType::BulkGeneration | TaskType::ProductGeneration => {
                vec!["image_generation".to_string()]
            }
            TaskType::QualityAssurance => vec!["quality_checks".to_string()],
        }
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Assigned,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Retrying,
}

impl TaskStatus {
    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// States in which a task sits in the queue waiting for assignment.
    pub fn is_queued(&self) -> bool {
        matches!(self, TaskStatus::Queued | TaskStatus::Retrying)
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Retrying => "retrying",
        }
    }
}

/// One unit of schedulable creative-generation work.
///
/// Identity, priority, deadline, requirements, and dependencies are fixed at
/// creation; only scheduling bookkeeping (status, worker, timestamps,
/// progress) is mutated afterwards, and only by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    /// Duration hint for capacity planning.
    pub estimated_duration_secs: u64,
    pub resource_requirements: ResourceProfile,
    /// Worker capabilities the task needs.
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    /// Task ids that must reach Completed before this task is assignable.
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_worker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// 0-100.
    pub progress_pct: f32,
    /// Free-form metadata (product name, variant slice, risk tags).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Task {
    /// Create a queued task with default bookkeeping fields.
    pub fn new(
        campaign_id: Uuid,
        task_type: TaskType,
        priority: TaskPriority,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            task_type,
            priority,
            created_at,
            deadline: None,
            estimated_duration_secs: 0,
            resource_requirements: ResourceProfile::new(),
            required_capabilities: task_type.required_capabilities(),
            dependencies: Vec::new(),
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            status: TaskStatus::Queued,
            assigned_worker: None,
            started_at: None,
            completed_at: None,
            error_message: None,
            progress_pct: 0.0,
            metadata: HashMap::new(),
        }
    }

    pub fn with_deadline(mut self, deadline: Option<DateTime<Utc>>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_requirements(mut self, requirements: ResourceProfile) -> Self {
        self.resource_requirements = requirements;
        self
    }

    pub fn with_duration_secs(mut self, secs: u64) -> Self {
        self.estimated_duration_secs = secs;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Uuid>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
