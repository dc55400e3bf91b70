//! Process CPU-time clock used by the stop watches.
//!
//! CPU time excludes I/O waits and other processes, so timings reflect this
//! process's compute cost only.

use std::cell::RefCell;
use std::rc::Rc;

use cpu_time::ProcessTime;

/// Source of monotonically non-decreasing seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Default clock: CPU seconds consumed by the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCpuClock;

impl Clock for ProcessCpuClock {
    fn now(&self) -> f64 {
        ProcessTime::now().as_duration().as_secs_f64()
    }
}

thread_local! {
    static CLOCK: RefCell<Option<Rc<dyn Clock>>> = const { RefCell::new(None) };
}

/// Current reading of the installed clock.
pub fn now() -> f64 {
    let custom = CLOCK.with(|c| c.borrow().clone());
    match custom {
        Some(clock) => clock.now(),
        None => ProcessCpuClock.now(),
    }
}

/// Replace the clock. `None` restores [`ProcessCpuClock`].
#[cfg(any(test, feature = "test-support"))]
pub(crate) fn install(clock: Option<Rc<dyn Clock>>) {
    CLOCK.with(|c| *c.borrow_mut() = clock);
}
