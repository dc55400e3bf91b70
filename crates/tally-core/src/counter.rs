//! Monotonic counters: a scalar [`Counter`] and a keyed [`MapCounter`].
//!
//! Sample use:
//!
//! ```ignore
//! let builds = Counter::get_or_create("builds")?;
//! builds.inc()?;      // one unit
//! builds.inc_by(4)?;  // four units
//! ```
//!
//! Totals saturate at `u64::MAX` instead of wrapping, so they never decrease.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{MetricError, Result};
use crate::metric::{Instrument, MetricKind, MetricState, Mergeable, Slot};
use crate::registry;

fn check_increment(name: &str, count: i64) -> Result<u64> {
    u64::try_from(count).map_err(|_| MetricError::NegativeIncrement {
        name: name.to_string(),
        count,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    pub name: String,
    pub total: u64,
}

impl MetricState for CounterState {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> String {
        self.total.to_string()
    }
}

impl Mergeable for CounterState {
    fn merge(&mut self, other: &Self) {
        self.total = self.total.saturating_add(other.total);
    }
}

/// A monotonically increasing metric.
#[derive(Debug, Clone)]
pub struct Counter {
    state: Rc<RefCell<CounterState>>,
}

impl Counter {
    /// Create and register a counter.
    pub fn new(name: &str) -> Result<Self> {
        let state = Rc::new(RefCell::new(CounterState {
            name: name.to_string(),
            total: 0,
        }));
        registry::register(name, Slot::Counter(state.clone()))?;
        Ok(Self { state })
    }

    pub fn get_or_create(name: &str) -> Result<Self> {
        registry::get_or_create(name, ())
    }

    /// Increment by 1.
    pub fn inc(&self) -> Result<()> {
        self.inc_by(1)
    }

    /// Increment by an arbitrary non-negative amount.
    pub fn inc_by(&self, count: i64) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let count = check_increment(&state.name, count)?;
        if !registry::is_enabled() {
            return Ok(());
        }
        state.total = state.total.saturating_add(count);
        Ok(())
    }

    pub fn total(&self) -> u64 {
        self.state.borrow().total
    }

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    pub fn summary(&self) -> String {
        self.state.borrow().summary()
    }

    /// True if both handles point at the same registered metric.
    pub fn same_instance(&self, other: &Counter) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl Instrument for Counter {
    const KIND: MetricKind = MetricKind::Counter;
    type Args = ();

    fn create(name: &str, _args: ()) -> Result<Self> {
        Counter::new(name)
    }

    fn from_slot(slot: &Slot) -> Option<Self> {
        match slot {
            Slot::Counter(state) => Some(Self { state: state.clone() }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapCounterState {
    pub name: String,
    pub counts: BTreeMap<String, u64>,
    pub total: u64,
}

impl MapCounterState {
    fn add(&mut self, key: &str, count: u64) {
        let slot = self.counts.entry(key.to_string()).or_insert(0);
        *slot = slot.saturating_add(count);
        self.total = self.total.saturating_add(count);
    }
}

impl MetricState for MapCounterState {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> String {
        let details = self
            .counts
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} {{{}}}", self.total, details)
    }
}

impl Mergeable for MapCounterState {
    fn merge(&mut self, other: &Self) {
        for (key, &count) in &other.counts {
            self.add(key, count);
        }
    }
}

/// A set of related counters keyed by an arbitrary string.
#[derive(Debug, Clone)]
pub struct MapCounter {
    state: Rc<RefCell<MapCounterState>>,
}

impl MapCounter {
    /// Create and register a map counter.
    pub fn new(name: &str) -> Result<Self> {
        let state = Rc::new(RefCell::new(MapCounterState {
            name: name.to_string(),
            ..MapCounterState::default()
        }));
        registry::register(name, Slot::MapCounter(state.clone()))?;
        Ok(Self { state })
    }

    pub fn get_or_create(name: &str) -> Result<Self> {
        registry::get_or_create(name, ())
    }

    /// Increment `key` by 1.
    pub fn inc(&self, key: &str) -> Result<()> {
        self.inc_by(key, 1)
    }

    /// Increment `key` by an arbitrary non-negative amount.
    pub fn inc_by(&self, key: &str, count: i64) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let count = check_increment(&state.name, count)?;
        if !registry::is_enabled() {
            return Ok(());
        }
        state.add(key, count);
        Ok(())
    }

    pub fn get(&self, key: &str) -> u64 {
        self.state.borrow().counts.get(key).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.state.borrow().total
    }

    pub fn counts(&self) -> BTreeMap<String, u64> {
        self.state.borrow().counts.clone()
    }

    pub fn summary(&self) -> String {
        self.state.borrow().summary()
    }
}

impl Instrument for MapCounter {
    const KIND: MetricKind = MetricKind::MapCounter;
    type Args = ();

    fn create(name: &str, _args: ()) -> Result<Self> {
        MapCounter::new(name)
    }

    fn from_slot(slot: &Slot) -> Option<Self> {
        match slot {
            Slot::MapCounter(state) => Some(Self { state: state.clone() }),
            _ => None,
        }
    }
}
