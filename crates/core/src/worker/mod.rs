//! Worker model and registry.

mod registry;
mod types;

pub use registry::{WorkerError, WorkerRegistry};
pub use types::{WorkerNode, WorkerStatus, WorkerUtilization};
