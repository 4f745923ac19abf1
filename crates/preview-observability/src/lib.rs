//! Observability infrastructure for bound configuration previews.
//!
//! This crate provides:
//! - `init_logging` - `tracing` subscriber setup in JSON or human format
//! - `DispatchMetrics` - Context elevation outcomes
//! - `SyncMetrics` - Per-route synchronizer counters

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;
