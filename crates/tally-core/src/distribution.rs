//! Streaming summary statistics over a sequence of samples.
//!
//! Only `count`, `sum`, `sum_of_squares`, `min` and `max` are stored, so two
//! distributions merge by plain addition and min/max.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metric::{Instrument, MetricKind, MetricState, Mergeable, Slot};
use crate::registry;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionState {
    pub name: String,
    pub count: u64,
    pub sum: f64,
    pub sum_of_squares: f64,
    /// `None` iff `count == 0`.
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl DistributionState {
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_of_squares += value * value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Population standard deviation.
    ///
    /// `(Σx²·n − (Σx)²) / n²` can come out slightly negative from rounding
    /// when the true variance is ~0; that is clamped to 0.
    pub fn stdev(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let variance = (self.sum_of_squares * n - self.sum * self.sum) / (n * n);
        Some(variance.max(0.0).sqrt())
    }
}

fn render(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{v:?}"),
        None => "none".to_string(),
    }
}

impl MetricState for DistributionState {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> String {
        format!(
            "total={:?}, count={}, min={}, max={}, mean={}, stdev={}",
            self.sum,
            self.count,
            render(self.min),
            render(self.max),
            render(self.mean()),
            render(self.stdev()),
        )
    }
}

impl Mergeable for DistributionState {
    fn merge(&mut self, other: &Self) {
        if other.count == 0 {
            return;
        }
        self.count += other.count;
        self.sum += other.sum;
        self.sum_of_squares += other.sum_of_squares;
        match (self.min, self.max, other.min, other.max) {
            (Some(min), Some(max), Some(omin), Some(omax)) => {
                self.min = Some(min.min(omin));
                self.max = Some(max.max(omax));
            }
            _ => {
                self.min = other.min;
                self.max = other.max;
            }
        }
    }
}

/// Tracks simple statistics of a distribution of values.
#[derive(Debug, Clone)]
pub struct Distribution {
    state: Rc<RefCell<DistributionState>>,
}

impl Distribution {
    pub fn new(name: &str) -> Result<Self> {
        let state = Rc::new(RefCell::new(DistributionState {
            name: name.to_string(),
            ..DistributionState::default()
        }));
        registry::register(name, Slot::Distribution(state.clone()))?;
        Ok(Self { state })
    }

    pub fn get_or_create(name: &str) -> Result<Self> {
        registry::get_or_create(name, ())
    }

    /// Add a sample. No-op while collection is disabled.
    pub fn add(&self, value: f64) {
        if !registry::is_enabled() {
            return;
        }
        self.state.borrow_mut().add(value);
    }

    pub fn count(&self) -> u64 {
        self.state.borrow().count
    }

    pub fn sum(&self) -> f64 {
        self.state.borrow().sum
    }

    pub fn min(&self) -> Option<f64> {
        self.state.borrow().min
    }

    pub fn max(&self) -> Option<f64> {
        self.state.borrow().max
    }

    pub fn mean(&self) -> Option<f64> {
        self.state.borrow().mean()
    }

    pub fn stdev(&self) -> Option<f64> {
        self.state.borrow().stdev()
    }

    pub fn state(&self) -> DistributionState {
        self.state.borrow().clone()
    }

    pub fn summary(&self) -> String {
        self.state.borrow().summary()
    }
}

impl Instrument for Distribution {
    const KIND: MetricKind = MetricKind::Distribution;
    type Args = ();

    fn create(name: &str, _args: ()) -> Result<Self> {
        Distribution::new(name)
    }

    fn from_slot(slot: &Slot) -> Option<Self> {
        match slot {
            Slot::Distribution(state) => Some(Self { state: state.clone() }),
            _ => None,
        }
    }
}
