//! The closed set of metric kinds.
//!
//! Two views of the same data live here:
//! - [`Metric`]: an owned, serializable record. This is what sessions write
//!   and what the merge pipeline reads.
//! - [`Slot`]: the registry's live cell for one metric, shared with the typed
//!   handles (`Counter`, `Distribution`, ...) that call sites hold.
//!
//! Every dispatch over kinds is an exhaustive `match`, so adding a kind
//! without teaching it to summarize and merge does not compile.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::counter::{CounterState, MapCounterState};
use crate::distribution::DistributionState;
use crate::error::{MetricError, Result, TypeMismatch};
use crate::snapshot::SnapshotState;
use crate::stopwatch::{ReentrantStopWatchState, StopWatchState};

/// Discriminant of a metric, used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Counter,
    MapCounter,
    Distribution,
    StopWatch,
    ReentrantStopWatch,
    Snapshot,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::MapCounter => "map_counter",
            MetricKind::Distribution => "distribution",
            MetricKind::StopWatch => "stop_watch",
            MetricKind::ReentrantStopWatch => "reentrant_stop_watch",
            MetricKind::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State shared by every metric kind.
pub trait MetricState {
    fn name(&self) -> &str;

    /// Human-readable rendering of the current value.
    fn summary(&self) -> String;
}

/// Fold another instance's state into this one.
///
/// Implementations must be commutative and associative so per-process
/// results aggregate to the same value in any order.
pub trait Mergeable {
    fn merge(&mut self, other: &Self);
}

/// Serializable metric record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Metric {
    Counter(CounterState),
    MapCounter(MapCounterState),
    Distribution(DistributionState),
    StopWatch(StopWatchState),
    ReentrantStopWatch(ReentrantStopWatchState),
    Snapshot(SnapshotState),
}

impl Metric {
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::MapCounter(_) => MetricKind::MapCounter,
            Metric::Distribution(_) => MetricKind::Distribution,
            Metric::StopWatch(_) => MetricKind::StopWatch,
            Metric::ReentrantStopWatch(_) => MetricKind::ReentrantStopWatch,
            Metric::Snapshot(_) => MetricKind::Snapshot,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Metric::Counter(s) => s.name(),
            Metric::MapCounter(s) => s.name(),
            Metric::Distribution(s) => s.name(),
            Metric::StopWatch(s) => s.name(),
            Metric::ReentrantStopWatch(s) => s.name(),
            Metric::Snapshot(s) => s.name(),
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Metric::Counter(s) => s.summary(),
            Metric::MapCounter(s) => s.summary(),
            Metric::Distribution(s) => s.summary(),
            Metric::StopWatch(s) => s.summary(),
            Metric::ReentrantStopWatch(s) => s.summary(),
            Metric::Snapshot(s) => s.summary(),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.summary())
    }
}

pub(crate) fn mismatch(name: &str, existing: MetricKind, incoming: MetricKind) -> MetricError {
    MetricError::MergeTypeMismatch(vec![TypeMismatch {
        name: name.to_string(),
        existing,
        incoming,
    }])
}

/// Live registry cell for one metric.
///
/// Cloning a slot clones the `Rc`, never the state.
#[derive(Debug, Clone)]
pub enum Slot {
    Counter(Rc<RefCell<CounterState>>),
    MapCounter(Rc<RefCell<MapCounterState>>),
    Distribution(Rc<RefCell<DistributionState>>),
    StopWatch(Rc<RefCell<StopWatchState>>),
    ReentrantStopWatch(Rc<RefCell<ReentrantStopWatchState>>),
    Snapshot(Rc<RefCell<SnapshotState>>),
}

impl Slot {
    pub fn kind(&self) -> MetricKind {
        match self {
            Slot::Counter(_) => MetricKind::Counter,
            Slot::MapCounter(_) => MetricKind::MapCounter,
            Slot::Distribution(_) => MetricKind::Distribution,
            Slot::StopWatch(_) => MetricKind::StopWatch,
            Slot::ReentrantStopWatch(_) => MetricKind::ReentrantStopWatch,
            Slot::Snapshot(_) => MetricKind::Snapshot,
        }
    }

    /// Copy the current state out as an owned record.
    pub fn to_metric(&self) -> Metric {
        match self {
            Slot::Counter(s) => Metric::Counter(s.borrow().clone()),
            Slot::MapCounter(s) => Metric::MapCounter(s.borrow().clone()),
            Slot::Distribution(s) => Metric::Distribution(s.borrow().clone()),
            Slot::StopWatch(s) => Metric::StopWatch(s.borrow().clone()),
            Slot::ReentrantStopWatch(s) => Metric::ReentrantStopWatch(s.borrow().clone()),
            Slot::Snapshot(s) => Metric::Snapshot(s.borrow().clone()),
        }
    }

    /// Fold a decoded record into the live state.
    ///
    /// Kinds must match exactly. Snapshots are per-process diagnostics and
    /// are rejected like a kind mismatch. On mismatch the slot is left
    /// untouched.
    pub(crate) fn merge(&self, name: &str, other: &Metric) -> Result<()> {
        match (self, other) {
            (Slot::Counter(a), Metric::Counter(b)) => a.borrow_mut().merge(b),
            (Slot::MapCounter(a), Metric::MapCounter(b)) => a.borrow_mut().merge(b),
            (Slot::Distribution(a), Metric::Distribution(b)) => a.borrow_mut().merge(b),
            (Slot::StopWatch(a), Metric::StopWatch(b)) => a.borrow_mut().merge(b),
            (Slot::ReentrantStopWatch(a), Metric::ReentrantStopWatch(b)) => {
                a.borrow_mut().merge(b)
            }
            (slot, other) => return Err(mismatch(name, slot.kind(), other.kind())),
        }
        Ok(())
    }
}

impl From<Metric> for Slot {
    fn from(metric: Metric) -> Self {
        fn cell<T>(state: T) -> Rc<RefCell<T>> {
            Rc::new(RefCell::new(state))
        }
        match metric {
            Metric::Counter(s) => Slot::Counter(cell(s)),
            Metric::MapCounter(s) => Slot::MapCounter(cell(s)),
            Metric::Distribution(s) => Slot::Distribution(cell(s)),
            Metric::StopWatch(s) => Slot::StopWatch(cell(s)),
            Metric::ReentrantStopWatch(s) => Slot::ReentrantStopWatch(cell(s)),
            Metric::Snapshot(s) => Slot::Snapshot(cell(s)),
        }
    }
}

/// A typed handle that can be constructed into, and recovered from, the
/// registry. Used by [`crate::registry::get_or_create`].
pub trait Instrument: Sized {
    const KIND: MetricKind;

    /// Constructor arguments. Ignored when the name already exists.
    type Args;

    /// Construct and register a new metric.
    fn create(name: &str, args: Self::Args) -> Result<Self>;

    /// Recover a handle from an existing slot, `None` if the kind differs.
    fn from_slot(slot: &Slot) -> Option<Self>;
}
