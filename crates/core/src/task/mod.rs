//! Task data model and priority queue.

mod queue;
mod types;

pub use queue::{QueueEntry, TaskQueue};
pub use types::{
    ResourceKind, ResourceProfile, Task, TaskPriority, TaskStatus, TaskType, DEFAULT_MAX_RETRIES,
};
