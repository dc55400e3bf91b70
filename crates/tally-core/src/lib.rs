//! tally core: in-process instrumentation for long-running analysis tools.
//!
//! Call sites record counters, distributions and CPU timings through
//! registry-owned metrics. A [`MetricsContext`] turns collection on for a
//! session and writes the registry to a file; separately recorded files are
//! later folded together with [`merge::merge_from_file`] and rendered with
//! [`registry::report`].
//!
//! ```ignore
//! use tally_core::{Counter, MetricsContext, ReentrantStopWatch};
//!
//! let ctx = MetricsContext::enter(Some("worker-1.yaml"));
//! let files = Counter::get_or_create("files_checked")?;
//! let solve = ReentrantStopWatch::get_or_create("solve_time")?;
//! for f in inputs {
//!     let _t = solve.enter();
//!     files.inc()?;
//! }
//! ctx.finish()?;
//! ```
//!
//! # Threading
//! Registry, collection flag, clock and profiler are per-thread state and
//! metric handles are `!Send`: instrumentation is single-threaded, and
//! cross-process aggregation goes through files only.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. All fallible
//! paths surface as `MetricError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod clock;
pub mod codec;
pub mod config;
pub mod context;
pub mod counter;
pub mod distribution;
pub mod error;
pub mod merge;
pub mod metric;
pub mod profiler;
pub mod registry;
pub mod snapshot;
pub mod stopwatch;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use context::MetricsContext;
pub use counter::{Counter, MapCounter};
pub use distribution::Distribution;
pub use error::{ErrorCode, MetricError, Result};
pub use metric::{Metric, MetricKind};
pub use snapshot::Snapshot;
pub use stopwatch::{ReentrantStopWatch, StopWatch};
