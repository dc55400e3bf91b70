//! Memory snapshots taken through the installed [`MemoryProfiler`].
//!
//! A snapshot metric is active only if all three hold when it is built:
//! a profiler is installed, collection is enabled, and the caller opted in
//! through [`SnapshotConfig::enabled`]. Otherwise every operation is a no-op.
//!
//! Entries are stored as preformatted text. They are diagnostic output, and
//! plain strings serialize and compare without surprises.
//!
//! [`MemoryProfiler`]: crate::profiler::MemoryProfiler

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::config::SnapshotConfig;
use crate::error::Result;
use crate::metric::{Instrument, MetricKind, MetricState, Slot};
use crate::profiler::{self, GroupBy};
use crate::registry;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotState {
    pub name: String,
    pub entries: Vec<String>,
    pub group_by: GroupBy,
    pub frame_depth: usize,
    pub retain_count: usize,
    #[serde(skip)]
    pub enabled: bool,
    #[serde(skip)]
    pub profiling_active: bool,
}

impl SnapshotState {
    /// Inactive state carrying `cfg`'s profiler settings.
    pub fn new(name: &str, cfg: &SnapshotConfig) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
            group_by: cfg.group_by,
            frame_depth: cfg.frame_depth,
            retain_count: cfg.retain_count,
            enabled: false,
            profiling_active: false,
        }
    }

    fn take(&mut self, label: &str) {
        if !self.enabled {
            return;
        }
        let rendered = profiler::with_profiler(|p| {
            if !self.profiling_active {
                p.start(self.frame_depth);
                self.profiling_active = true;
            }
            p.statistics(self.group_by)
                .iter()
                .take(self.retain_count)
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        });
        if let Some(lines) = rendered {
            self.entries.push(format!("{label}:\n{lines}"));
        }
    }

    fn start_profiling(&mut self) {
        if !self.enabled {
            return;
        }
        if profiler::with_profiler(|p| p.start(self.frame_depth)).is_some() {
            self.profiling_active = true;
        }
    }

    fn stop_profiling(&mut self) {
        profiler::with_profiler(|p| p.stop());
        self.profiling_active = false;
    }
}

impl MetricState for SnapshotState {
    fn name(&self) -> &str {
        &self.name
    }

    fn summary(&self) -> String {
        self.entries.join("\n\n")
    }
}

/// Tracks memory usage via profiler snapshots.
#[derive(Debug, Clone)]
pub struct Snapshot {
    state: Rc<RefCell<SnapshotState>>,
}

impl Snapshot {
    /// Create and register a snapshot metric. `cfg` is validated first.
    pub fn new(name: &str, cfg: &SnapshotConfig) -> Result<Self> {
        cfg.validate()?;
        let mut state = SnapshotState::new(name, cfg);
        state.enabled = profiler::is_available() && registry::is_enabled() && cfg.enabled;
        let state = Rc::new(RefCell::new(state));
        registry::register(name, Slot::Snapshot(state.clone()))?;
        Ok(Self { state })
    }

    pub fn get_or_create(name: &str, cfg: &SnapshotConfig) -> Result<Self> {
        registry::get_or_create(name, cfg.clone())
    }

    /// Append one record of the top allocation groups, starting the
    /// profiler first if needed.
    pub fn take_snapshot(&self, label: &str) {
        self.state.borrow_mut().take(label);
    }

    /// Start profiling and record an `"enter"` snapshot. The guard records
    /// `"exit"` and stops profiling when dropped.
    pub fn enter(&self) -> SnapshotGuard {
        {
            let mut state = self.state.borrow_mut();
            state.start_profiling();
            state.take("enter");
        }
        SnapshotGuard {
            state: self.state.clone(),
        }
    }

    /// Profile `f`.
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.enter();
        f()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.borrow().enabled
    }

    pub fn is_profiling(&self) -> bool {
        self.state.borrow().profiling_active
    }

    pub fn entries(&self) -> Vec<String> {
        self.state.borrow().entries.clone()
    }

    pub fn summary(&self) -> String {
        self.state.borrow().summary()
    }
}

impl Instrument for Snapshot {
    const KIND: MetricKind = MetricKind::Snapshot;
    type Args = SnapshotConfig;

    fn create(name: &str, args: SnapshotConfig) -> Result<Self> {
        Snapshot::new(name, &args)
    }

    fn from_slot(slot: &Slot) -> Option<Self> {
        match slot {
            Slot::Snapshot(state) => Some(Self { state: state.clone() }),
            _ => None,
        }
    }
}

#[must_use = "profiling stops when the guard is dropped"]
pub struct SnapshotGuard {
    state: Rc<RefCell<SnapshotState>>,
}

impl Drop for SnapshotGuard {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        if !state.profiling_active {
            return;
        }
        state.take("exit");
        state.stop_profiling();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use super::*;
    use crate::profiler::{AllocationStat, MemoryProfiler};
    use crate::testing;

    /// Reports `calls` growing blocks per query.
    #[derive(Default)]
    struct FakeProfiler {
        tracing: bool,
        starts: Rc<Cell<u32>>,
        queries: Cell<u64>,
    }

    impl MemoryProfiler for FakeProfiler {
        fn start(&mut self, frame_depth: usize) {
            assert!(frame_depth >= 1);
            self.tracing = true;
            self.starts.set(self.starts.get() + 1);
        }

        fn stop(&mut self) {
            self.tracing = false;
        }

        fn is_tracing(&self) -> bool {
            self.tracing
        }

        fn statistics(&self, group_by: GroupBy) -> Vec<AllocationStat> {
            assert!(self.tracing, "queried while stopped");
            let n = self.queries.get() + 1;
            self.queries.set(n);
            let groups = match group_by {
                GroupBy::SizeClass => vec!["<= 4 KiB", "<= 64 B", "<= 8 B"],
                GroupBy::Total => vec!["total"],
            };
            groups
                .into_iter()
                .map(|g| AllocationStat {
                    group: g.to_string(),
                    size_bytes: 64 * n,
                    blocks: n,
                })
                .collect()
        }
    }

    fn opted_in(retain_count: usize) -> SnapshotConfig {
        SnapshotConfig {
            enabled: true,
            retain_count,
            ..SnapshotConfig::default()
        }
    }

    fn install_fake() -> Rc<Cell<u32>> {
        let starts = Rc::new(Cell::new(0));
        profiler::install(Box::new(FakeProfiler {
            starts: starts.clone(),
            ..FakeProfiler::default()
        }));
        starts
    }

    #[test]
    fn enabled_requires_all_three_conditions() {
        testing::reset(true);
        assert!(!Snapshot::new("no_profiler", &opted_in(10)).unwrap().is_enabled());

        install_fake();
        assert!(!Snapshot::new("not_opted_in", &SnapshotConfig::default())
            .unwrap()
            .is_enabled());
        assert!(Snapshot::new("all_set", &opted_in(10)).unwrap().is_enabled());

        registry::set_enabled(false);
        assert!(!Snapshot::new("collection_off", &opted_in(10)).unwrap().is_enabled());
    }

    #[test]
    fn invalid_config_is_rejected_before_registration() {
        testing::reset(true);
        install_fake();
        let err = Snapshot::new("mem", &opted_in(0)).unwrap_err();
        assert_eq!(err.code().as_str(), "INVALID_CONFIG");
        let deep = SnapshotConfig {
            frame_depth: 0,
            ..opted_in(10)
        };
        assert!(Snapshot::get_or_create("mem", &deep).is_err());
        assert!(!registry::contains("mem"));

        assert!(Snapshot::new("mem", &opted_in(1)).is_ok());
    }

    #[test]
    fn disabled_snapshot_is_a_no_op() {
        testing::reset(true);
        let starts = install_fake();
        let s = Snapshot::new("mem", &SnapshotConfig::default()).unwrap();
        s.scope(|| s.take_snapshot("middle"));
        assert!(s.entries().is_empty());
        assert_eq!(starts.get(), 0);
        assert!(!s.is_profiling());
    }

    #[test]
    fn scope_records_enter_and_exit() {
        testing::reset(true);
        let starts = install_fake();
        let s = Snapshot::new("mem", &opted_in(2)).unwrap();
        {
            let _g = s.enter();
            assert!(s.is_profiling());
            s.take_snapshot("checkpoint");
        }
        assert!(!s.is_profiling());
        assert_eq!(starts.get(), 1);

        let entries = s.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0],
            "enter:\n<= 4 KiB: size=64 B, count=1, average=64 B\n<= 64 B: size=64 B, count=1, average=64 B"
        );
        assert!(entries[1].starts_with("checkpoint:\n"));
        assert!(entries[2].starts_with("exit:\n"));
        assert_eq!(entries[2].lines().count(), 3);
        assert_eq!(s.summary(), entries.join("\n\n"));
    }

    #[test]
    fn take_snapshot_starts_profiler_lazily() {
        testing::reset(true);
        let starts = install_fake();
        let s = Snapshot::new(
            "lazy",
            &SnapshotConfig {
                group_by: GroupBy::Total,
                ..opted_in(10)
            },
        )
        .unwrap();
        s.take_snapshot("a");
        s.take_snapshot("b");
        assert_eq!(starts.get(), 1);
        assert!(s.is_profiling());
        assert_eq!(s.entries()[1], "b:\ntotal: size=128 B, count=2, average=64 B");
    }

    #[test]
    fn exit_stops_profiler_on_panic() {
        testing::reset(true);
        install_fake();
        let s = Snapshot::new("mem", &opted_in(1)).unwrap();
        let res = catch_unwind(AssertUnwindSafe(|| {
            s.scope(|| panic!("work failed"));
        }));
        assert!(res.is_err());
        assert!(!s.is_profiling());
        assert_eq!(s.entries().len(), 2);
        assert_eq!(profiler::with_profiler(|p| p.is_tracing()), Some(false));
    }
}
