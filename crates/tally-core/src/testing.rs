//! Test isolation helpers. Never called from production code paths.

use std::cell::Cell;
use std::rc::Rc;

use crate::clock::{self, Clock};
use crate::{profiler, registry};

/// Clear the registry, set the collection flag, and restore the default
/// clock and profiler.
pub fn reset(enabled: bool) {
    registry::clear();
    registry::set_enabled(enabled);
    clock::install(None);
    profiler::uninstall();
}

/// Clock advanced by hand.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    seconds: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, seconds: f64) {
        self.seconds.set(self.seconds.get() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.seconds.get()
    }
}

/// Install `clock` for the current thread and return it for advancing.
pub fn install_clock(clock: ManualClock) -> ManualClock {
    clock::install(Some(Rc::new(clock.clone())));
    clock
}
