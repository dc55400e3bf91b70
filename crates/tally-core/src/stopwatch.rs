//! Scoped CPU-time measurement.
//!
//! Both watches hand out guards; the elapsed time is recorded when the guard
//! drops, which also happens on early returns and unwinding.
//!
//! ```ignore
//! let watch = ReentrantStopWatch::get_or_create("solve_time")?;
//! fn solve(watch: &ReentrantStopWatch, n: u32) {
//!     let _t = watch.enter();
//!     if n > 0 { solve(watch, n - 1); } // nested entries are not double-counted
//! }
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::clock;
use crate::error::Result;
use crate::metric::{Instrument, MetricKind, MetricState, Mergeable, Slot};
use crate::registry;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopWatchState {
    pub name: String,
    /// Seconds.
    pub total: f64,
}

impl MetricState for StopWatchState {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> String {
        format!("{:.6} seconds", self.total)
    }
}

impl Mergeable for StopWatchState {
    fn merge(&mut self, other: &Self) {
        self.total += other.total;
    }
}

/// Measures the time spent in one scope.
///
/// Not reentrant: each completed scope overwrites `total`. Nesting scopes of
/// the same watch is unsupported; use [`ReentrantStopWatch`] for recursion.
#[derive(Debug, Clone)]
pub struct StopWatch {
    state: Rc<RefCell<StopWatchState>>,
}

impl StopWatch {
    pub fn new(name: &str) -> Result<Self> {
        let state = Rc::new(RefCell::new(StopWatchState {
            name: name.to_string(),
            total: 0.0,
        }));
        registry::register(name, Slot::StopWatch(state.clone()))?;
        Ok(Self { state })
    }

    pub fn get_or_create(name: &str) -> Result<Self> {
        registry::get_or_create(name, ())
    }

    /// Start timing; the scope ends when the guard drops.
    pub fn start(&self) -> StopWatchGuard {
        StopWatchGuard {
            state: self.state.clone(),
            started_at: clock::now(),
        }
    }

    /// Time `f`.
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        f()
    }

    pub fn total(&self) -> f64 {
        self.state.borrow().total
    }

    pub fn summary(&self) -> String {
        self.state.borrow().summary()
    }
}

impl Instrument for StopWatch {
    const KIND: MetricKind = MetricKind::StopWatch;
    type Args = ();

    fn create(name: &str, _args: ()) -> Result<Self> {
        StopWatch::new(name)
    }

    fn from_slot(slot: &Slot) -> Option<Self> {
        match slot {
            Slot::StopWatch(state) => Some(Self { state: state.clone() }),
            _ => None,
        }
    }
}

#[must_use = "the scope is timed until the guard is dropped"]
pub struct StopWatchGuard {
    state: Rc<RefCell<StopWatchState>>,
    started_at: f64,
}

impl Drop for StopWatchGuard {
    fn drop(&mut self) {
        let elapsed = clock::now() - self.started_at;
        if registry::is_enabled() {
            self.state.borrow_mut().total = elapsed;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReentrantStopWatchState {
    pub name: String,
    /// Seconds.
    pub accumulated: f64,
    /// Open scopes; runtime only.
    #[serde(skip)]
    pub depth: u32,
    #[serde(skip)]
    pub(crate) started_at: Option<f64>,
}

impl ReentrantStopWatchState {
    fn enter(&mut self) {
        if self.depth == 0 {
            self.started_at = Some(clock::now());
        }
        self.depth += 1;
    }

    fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth > 0 {
            return;
        }
        if let Some(started_at) = self.started_at.take() {
            if registry::is_enabled() {
                self.accumulated += clock::now() - started_at;
            }
        }
    }
}

impl MetricState for ReentrantStopWatchState {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> String {
        format!("time spent below this StopWatch: {:.6} seconds", self.accumulated)
    }
}

impl Mergeable for ReentrantStopWatchState {
    fn merge(&mut self, other: &Self) {
        self.accumulated += other.accumulated;
    }
}

/// A watch that can be entered repeatedly and recursively.
///
/// Only the outermost scope is timed: the clock starts on the 0→1 depth
/// transition and the elapsed time is added on the matching 1→0 exit.
#[derive(Debug, Clone)]
pub struct ReentrantStopWatch {
    state: Rc<RefCell<ReentrantStopWatchState>>,
}

impl ReentrantStopWatch {
    pub fn new(name: &str) -> Result<Self> {
        let state = Rc::new(RefCell::new(ReentrantStopWatchState {
            name: name.to_string(),
            ..ReentrantStopWatchState::default()
        }));
        registry::register(name, Slot::ReentrantStopWatch(state.clone()))?;
        Ok(Self { state })
    }

    pub fn get_or_create(name: &str) -> Result<Self> {
        registry::get_or_create(name, ())
    }

    pub fn enter(&self) -> ReentrantGuard {
        self.state.borrow_mut().enter();
        ReentrantGuard {
            state: self.state.clone(),
        }
    }

    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.enter();
        f()
    }

    pub fn accumulated(&self) -> f64 {
        self.state.borrow().accumulated
    }

    pub fn depth(&self) -> u32 {
        self.state.borrow().depth
    }

    pub fn summary(&self) -> String {
        self.state.borrow().summary()
    }
}

impl Instrument for ReentrantStopWatch {
    const KIND: MetricKind = MetricKind::ReentrantStopWatch;
    type Args = ();

    fn create(name: &str, _args: ()) -> Result<Self> {
        ReentrantStopWatch::new(name)
    }

    fn from_slot(slot: &Slot) -> Option<Self> {
        match slot {
            Slot::ReentrantStopWatch(state) => Some(Self { state: state.clone() }),
            _ => None,
        }
    }
}

#[must_use = "the scope is timed until the guard is dropped"]
pub struct ReentrantGuard {
    state: Rc<RefCell<ReentrantStopWatchState>>,
}

impl Drop for ReentrantGuard {
    fn drop(&mut self) {
        self.state.borrow_mut().exit();
    }
}
