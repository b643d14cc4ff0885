//! Campaign decomposition.
//!
//! Turns a campaign brief into an ordered batch of tasks. Highly
//! parallelizable campaigns become independent per-product generation tasks;
//! everything else becomes a planning -> bulk generation -> QA pipeline
//! wired together with dependencies.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::campaign::{CampaignBrief, CampaignMetadata};
use crate::deadline::deadline_pressure;
use crate::optimizer::optimize_batch;
use crate::predictor::PerformancePredictor;
use crate::task::{Task, TaskPriority, TaskType};

use super::types::SchedulerError;

/// Base priority for every task in a campaign.
///
/// Checked in order: explicit emergency tags win, then deadline pressure,
/// then client tier. Campaigns with nothing special land at Normal.
pub fn base_priority(brief: &CampaignBrief, now: DateTime<Utc>) -> TaskPriority {
    if brief.has_tag("emergency") || brief.has_tag("critical") {
        return TaskPriority::Emergency;
    }

    let pressure = deadline_pressure(brief.deadline, now);
    if pressure > 0.8 {
        return TaskPriority::Urgent;
    }
    if pressure > 0.6 {
        return TaskPriority::High;
    }

    if brief.client_tier.is_priority_tier() {
        return TaskPriority::High;
    }

    TaskPriority::Normal
}

/// Decompose a campaign into tasks.
///
/// The returned batch is already ordered for enqueueing: dependency order
/// within pipelines, then deadline-optimized within each priority tier.
pub fn decompose_campaign(
    campaign_id: Uuid,
    brief: &CampaignBrief,
    metadata: &CampaignMetadata,
    parallelization_threshold: f64,
    default_max_retries: u32,
    now: DateTime<Utc>,
) -> Result<Vec<Task>, SchedulerError> {
    let priority = base_priority(brief, now);

    let mut tasks = if metadata.parallelization_potential > parallelization_threshold
        && !brief.products.is_empty()
    {
        parallel_tasks(campaign_id, brief, metadata, priority, now)
    } else {
        pipeline_tasks(campaign_id, brief, metadata, priority, now)
    };

    for task in &mut tasks {
        task.max_retries = default_max_retries;
    }

    validate_dependencies(campaign_id, &tasks)?;
    optimize_batch(&mut tasks);

    debug!(
        "Decomposed campaign {} ({}) into {} tasks at {:?} priority",
        campaign_id,
        brief.name,
        tasks.len(),
        priority
    );
    Ok(tasks)
}

/// One independent generation task per product, variants split evenly.
fn parallel_tasks(
    campaign_id: Uuid,
    brief: &CampaignBrief,
    metadata: &CampaignMetadata,
    priority: TaskPriority,
    now: DateTime<Utc>,
) -> Vec<Task> {
    let predictor = PerformancePredictor::new();
    let products = brief.products.len() as u32;
    let per_product = (metadata.estimated_variants / products.max(1)).max(1);

    brief
        .products
        .iter()
        .map(|product| {
            let estimate = predictor.estimate(
                TaskType::ProductGeneration,
                metadata.complexity,
                per_product,
            );
            Task::new(campaign_id, TaskType::ProductGeneration, priority, now)
                .with_deadline(brief.deadline)
                .with_duration_secs(estimate.duration_secs)
                .with_requirements(estimate.resources)
                .with_metadata("product", product)
        })
        .collect()
}

/// Sequential planning -> bulk generation -> QA chain.
fn pipeline_tasks(
    campaign_id: Uuid,
    brief: &CampaignBrief,
    metadata: &CampaignMetadata,
    priority: TaskPriority,
    now: DateTime<Utc>,
) -> Vec<Task> {
    let predictor = PerformancePredictor::new();
    let variants = metadata.estimated_variants;

    let plan_estimate = predictor.estimate(TaskType::Planning, metadata.complexity, 1);
    let planning = Task::new(campaign_id, TaskType::Planning, priority, now)
        .with_deadline(brief.deadline)
        .with_duration_secs(plan_estimate.duration_secs)
        .with_requirements(plan_estimate.resources);

    let bulk_estimate = predictor.estimate(TaskType::BulkGeneration, metadata.complexity, variants);
    let bulk = Task::new(campaign_id, TaskType::BulkGeneration, priority, now)
        .with_deadline(brief.deadline)
        .with_duration_secs(bulk_estimate.duration_secs)
        .with_requirements(bulk_estimate.resources)
        .with_dependencies(vec![planning.id]);

    let qa_estimate = predictor.estimate(TaskType::QualityAssurance, metadata.complexity, variants);
    let qa = Task::new(campaign_id, TaskType::QualityAssurance, priority, now)
        .with_deadline(brief.deadline)
        .with_duration_secs(qa_estimate.duration_secs)
        .with_requirements(qa_estimate.resources)
        .with_dependencies(vec![bulk.id]);

    vec![planning, bulk, qa]
}

/// Reject batches whose dependencies point outside the batch or form a
/// cycle. Runs at submission so nothing malformed ever reaches the queue.
fn validate_dependencies(campaign_id: Uuid, tasks: &[Task]) -> Result<(), SchedulerError> {
    let ids: HashSet<Uuid> = tasks.iter().map(|t| t.id).collect();

    for task in tasks {
        for dep in &task.dependencies {
            if !ids.contains(dep) {
                return Err(SchedulerError::CyclicDependency(campaign_id));
            }
        }
    }

    // Kahn-style peel: repeatedly remove tasks whose dependencies are all
    // already removed. Leftovers mean a cycle.
    let mut resolved: HashSet<Uuid> = HashSet::new();
    let mut remaining: Vec<&Task> = tasks.iter().collect();
    loop {
        let before = remaining.len();
        remaining.retain(|task| {
            let ready = task.dependencies.iter().all(|d| resolved.contains(d));
            if ready {
                resolved.insert(task.id);
            }
            !ready
        });
        if remaining.is_empty() {
            return Ok(());
        }
        if remaining.len() == before {
            return Err(SchedulerError::CyclicDependency(campaign_id));
        }
    }
}
