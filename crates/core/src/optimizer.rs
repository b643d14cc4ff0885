//! Batch ordering ahead of enqueue.
//!
//! Reorders tasks for better deadline locality before they enter the queue.
//! Only tasks *within* the same priority tier are reordered (by ascending
//! deadline, undated last); the relative order of different tiers is left
//! exactly as produced by decomposition.

use std::cmp::Ordering;

use crate::task::Task;

/// Sort each consecutive run of equal-priority tasks by ascending deadline.
///
/// The sort is stable, so tasks with equal deadlines keep their
/// decomposition order (which encodes dependency chains).
pub fn optimize_batch(tasks: &mut [Task]) {
    let mut start = 0;
    while start < tasks.len() {
        let priority = tasks[start].priority;
        let mut end = start + 1;
        while end < tasks.len() && tasks[end].priority == priority {
            end += 1;
        }
        tasks[start..end].sort_by(|a, b| match (a.deadline, b.deadline) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        start = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskPriority, TaskType};
    use chrono::{DateTime, Duration, Utc};
    use uuid::Uuid;

    fn task(priority: TaskPriority, deadline: Option<DateTime<Utc>>) -> Task {
        Task::new(Uuid::new_v4(), TaskType::ProductGeneration, priority, Utc::now())
            .with_deadline(deadline)
    }

    #[test]
    fn test_reorders_within_tier_by_deadline() {
        let now = Utc::now();
        let mut batch = vec![
            task(TaskPriority::Normal, Some(now + Duration::hours(10))),
            task(TaskPriority::Normal, None),
            task(TaskPriority::Normal, Some(now + Duration::hours(2))),
        ];
        let late = batch[0].id;
        let undated = batch[1].id;
        let soon = batch[2].id;

        optimize_batch(&mut batch);

        let order: Vec<_> = batch.iter().map(|t| t.id).collect();
        assert_eq!(order, vec![soon, late, undated]);
    }

    #[test]
    fn test_never_crosses_priority_tiers() {
        let now = Utc::now();
        // Low tier listed before High tier; a full sort would swap them.
        let mut batch = vec![
            task(TaskPriority::Low, Some(now + Duration::hours(1))),
            task(TaskPriority::High, Some(now + Duration::hours(50))),
            task(TaskPriority::High, Some(now + Duration::hours(5))),
        ];
        let low = batch[0].id;
        let high_late = batch[1].id;
        let high_soon = batch[2].id;

        optimize_batch(&mut batch);

        let order: Vec<_> = batch.iter().map(|t| t.id).collect();
        // Low stays first; only the High run is reordered.
        assert_eq!(order, vec![low, high_soon, high_late]);
    }

    #[test]
    fn test_stable_for_equal_deadlines() {
        let now = Utc::now();
        let deadline = Some(now + Duration::hours(4));
        let mut batch = vec![
            task(TaskPriority::Normal, deadline),
            task(TaskPriority::Normal, deadline),
        ];
        let first = batch[0].id;
        let second = batch[1].id;

        optimize_batch(&mut batch);

        assert_eq!(batch[0].id, first);
        assert_eq!(batch[1].id, second);
    }
}
