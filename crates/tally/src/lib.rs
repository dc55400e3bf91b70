//! Top-level facade crate for tally.
//!
//! Re-exports the core instrumentation library and the report aggregation
//! library so users can depend on a single crate.

pub mod core {
    pub use tally_core::*;
}

pub mod report {
    pub use tally_report::*;
}

pub use tally_core::{
    Counter, Distribution, MapCounter, Metric, MetricError, MetricsContext, ReentrantStopWatch,
    Result, Snapshot, StopWatch,
};
