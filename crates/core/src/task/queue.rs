//! Priority queue over tasks.
//!
//! Min-heap over the total task order: priority ordinal first, then earlier
//! deadline (tasks without a deadline sort after those with one), then
//! earlier `created_at`, then submission sequence. The sequence is assigned
//! from a single counter at push time, which keeps the order total and
//! deterministic even for tasks submitted within the same clock tick.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{Task, TaskPriority};

/// A queued reference to a task, carrying just the ordering key.
///
/// The queue never owns tasks; entries can go stale when a task is cancelled
/// or failed while queued. Stale entries are lazily dropped by the caller on
/// pop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub task_id: Uuid,
    pub priority: TaskPriority,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub seq: u64,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| match (self.deadline, other.deadline) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-priority queue of task references.
#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: BinaryHeap<Reverse<QueueEntry>>,
    next_seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a task. O(log n).
    pub fn push(&mut self, task: &Task) {
        let entry = QueueEntry {
            task_id: task.id,
            priority: task.priority,
            deadline: task.deadline,
            created_at: task.created_at,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.heap.push(Reverse(entry));
    }

    /// Pop the highest-priority entry. Readiness is the caller's concern.
    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.heap.pop().map(|Reverse(entry)| entry)
    }

    /// Re-insert a popped entry with its original ordering key.
    ///
    /// Used when the popped task turned out not to be ready this tick.
    pub fn push_back(&mut self, entry: QueueEntry) {
        self.heap.push(Reverse(entry));
    }

    pub fn peek(&self) -> Option<&QueueEntry> {
        self.heap.peek().map(|Reverse(entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
