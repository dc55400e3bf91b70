//! Process-wide metric registry and collection flag.
//!
//! The registry maps a metric name to its canonical [`Slot`]. It is mutated
//! only by metric construction, by the merge pipeline, and by the test-only
//! reset in [`crate::testing`].
//!
//! State is kept in `thread_local!` cells: instrumentation runs on one
//! logical thread per process, and the `Rc` handles handed out here cannot
//! cross threads, so no locking is needed.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::error::{MetricError, Result};
use crate::metric::{Instrument, Metric, Slot};

thread_local! {
    static METRICS: RefCell<BTreeMap<String, Slot>> = const { RefCell::new(BTreeMap::new()) };
    static ENABLED: Cell<bool> = const { Cell::new(false) };
}

/// `[A-Za-z_][A-Za-z0-9_]+`
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else { return false; };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    let mut rest = 0usize;
    for c in chars {
        if !(c.is_ascii_alphanumeric() || c == '_') {
            return false;
        }
        rest += 1;
    }
    rest > 0
}

/// Insert a freshly constructed metric.
///
/// Fails without touching the registry if the name is malformed or taken.
pub fn register(name: &str, slot: Slot) -> Result<()> {
    if !is_valid_name(name) {
        return Err(MetricError::InvalidName(name.to_string()));
    }
    METRICS.with(|m| {
        let mut m = m.borrow_mut();
        if m.contains_key(name) {
            return Err(MetricError::DuplicateName(name.to_string()));
        }
        tracing::debug!(metric = name, kind = %slot.kind(), "metric registered");
        m.insert(name.to_string(), slot);
        Ok(())
    })
}

/// Canonical slot for `name`, if registered.
pub fn lookup(name: &str) -> Option<Slot> {
    METRICS.with(|m| m.borrow().get(name).cloned())
}

pub fn contains(name: &str) -> bool {
    METRICS.with(|m| m.borrow().contains_key(name))
}

pub fn len() -> usize {
    METRICS.with(|m| m.borrow().len())
}

pub fn is_empty() -> bool {
    len() == 0
}

/// Registered names in lexicographic order.
pub fn names() -> Vec<String> {
    METRICS.with(|m| m.borrow().keys().cloned().collect())
}

/// Return the metric registered under `name`, or construct one.
///
/// First registration wins: when `name` exists, `args` are ignored even if
/// they differ from the ones the metric was built with. Asking for a
/// different kind than the registered one is an error.
pub fn get_or_create<M: Instrument>(name: &str, args: M::Args) -> Result<M> {
    match lookup(name) {
        Some(slot) => M::from_slot(&slot).ok_or_else(|| MetricError::KindMismatch {
            name: name.to_string(),
            expected: M::KIND,
            found: slot.kind(),
        }),
        None => M::create(name, args),
    }
}

/// Owned copies of every metric, in name order.
pub fn metrics() -> Vec<Metric> {
    METRICS.with(|m| m.borrow().values().map(Slot::to_metric).collect())
}

/// One `name: summary` line per metric, sorted by name.
pub fn report() -> String {
    let mut out = String::new();
    for metric in metrics() {
        let _ = writeln!(out, "{metric}");
    }
    out
}

/// Whether mutating operations currently have any effect.
pub fn is_enabled() -> bool {
    ENABLED.with(Cell::get)
}

/// Set the collection flag, returning the previous value.
pub(crate) fn set_enabled(enabled: bool) -> bool {
    ENABLED.with(|e| e.replace(enabled))
}

/// Insert a decoded record wholesale. Caller has checked the name is free.
pub(crate) fn adopt(metric: Metric) {
    let name = metric.name().to_string();
    METRICS.with(|m| {
        m.borrow_mut().insert(name, Slot::from(metric));
    });
}

#[cfg(any(test, feature = "test-support"))]
pub(crate) fn clear() {
    METRICS.with(|m| m.borrow_mut().clear());
}
