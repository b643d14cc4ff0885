//! HTTP surface for the Atelier scheduler.
//!
//! Exposed as a library so integration tests can build the router in-process
//! with mock backends injected.

pub mod api;
pub mod metrics;
pub mod state;
