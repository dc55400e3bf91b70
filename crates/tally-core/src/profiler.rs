//! Memory-profiling capability used by [`crate::snapshot::Snapshot`].
//!
//! The snapshot metric only depends on the [`MemoryProfiler`] trait. A
//! profiler is made available to the current thread with [`install`]; when
//! none is installed, snapshots are disabled.
//!
//! The built-in implementation is [`AllocatorProfiler`], which reads the
//! counters maintained by [`TrackingAllocator`]:
//!
//! ```rust,ignore
//! use tally_core::profiler::{self, AllocatorProfiler, TrackingAllocator};
//!
//! #[global_allocator]
//! static GLOBAL: TrackingAllocator = TrackingAllocator::new(std::alloc::System);
//!
//! profiler::install(Box::new(AllocatorProfiler));
//! ```

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Key used to group allocation statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// One line per power-of-two block size class.
    #[default]
    SizeClass,
    /// A single line for all live blocks.
    Total,
}

/// One grouped line of allocation statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationStat {
    pub group: String,
    pub size_bytes: u64,
    pub blocks: u64,
}

impl fmt::Display for AllocationStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let average = if self.blocks == 0 { 0 } else { self.size_bytes / self.blocks };
        write!(
            f,
            "{}: size={} B, count={}, average={} B",
            self.group, self.size_bytes, self.blocks, average
        )
    }
}

pub trait MemoryProfiler {
    /// Begin tracing. `frame_depth` is the number of stack frames to keep per
    /// block, for profilers that capture call stacks.
    fn start(&mut self, frame_depth: usize);

    fn stop(&mut self);

    fn is_tracing(&self) -> bool;

    /// Statistics for live blocks, largest first.
    fn statistics(&self, group_by: GroupBy) -> Vec<AllocationStat>;
}

thread_local! {
    static PROFILER: RefCell<Option<Box<dyn MemoryProfiler>>> = const { RefCell::new(None) };
}

/// Make `profiler` available to snapshots created afterwards on this thread.
pub fn install(profiler: Box<dyn MemoryProfiler>) {
    PROFILER.with(|p| *p.borrow_mut() = Some(profiler));
}

pub fn uninstall() {
    PROFILER.with(|p| {
        if let Some(mut old) = p.borrow_mut().take() {
            if old.is_tracing() {
                old.stop();
            }
        }
    });
}

pub fn is_available() -> bool {
    PROFILER.with(|p| p.borrow().is_some())
}

/// Run `f` against the installed profiler, `None` if there is none.
pub fn with_profiler<R>(f: impl FnOnce(&mut dyn MemoryProfiler) -> R) -> Option<R> {
    PROFILER.with(|p| p.borrow_mut().as_mut().map(|profiler| f(profiler.as_mut())))
}

/// Number of size classes; the last one also holds everything larger.
const SIZE_CLASSES: usize = 48;

#[allow(clippy::declare_interior_mutable_const)]
const ZERO: AtomicU64 = AtomicU64::new(0);

static TRACING: AtomicBool = AtomicBool::new(false);
static LIVE_BYTES: [AtomicU64; SIZE_CLASSES] = [ZERO; SIZE_CLASSES];
static LIVE_BLOCKS: [AtomicU64; SIZE_CLASSES] = [ZERO; SIZE_CLASSES];

/// Class `i` holds blocks of size `(2^(i-1), 2^i]`.
fn size_class(size: usize) -> usize {
    let class = (usize::BITS - size.saturating_sub(1).leading_zeros()) as usize;
    class.min(SIZE_CLASSES - 1)
}

fn class_label(class: usize) -> String {
    let bound = 1u64 << class;
    match bound {
        b if b >= 1 << 30 => format!("<= {} GiB", b >> 30),
        b if b >= 1 << 20 => format!("<= {} MiB", b >> 20),
        b if b >= 1 << 10 => format!("<= {} KiB", b >> 10),
        b => format!("<= {b} B"),
    }
}

fn record_alloc(size: usize) {
    let class = size_class(size);
    LIVE_BYTES[class].fetch_add(size as u64, Ordering::Relaxed);
    LIVE_BLOCKS[class].fetch_add(1, Ordering::Relaxed);
}

fn record_dealloc(size: usize) {
    let class = size_class(size);
    // Blocks allocated before tracing started may be freed while it runs.
    let _ = LIVE_BYTES[class].fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
        Some(v.saturating_sub(size as u64))
    });
    let _ = LIVE_BLOCKS[class].fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
        Some(v.saturating_sub(1))
    });
}

/// A `GlobalAlloc` wrapper that counts live blocks per size class while
/// tracing is switched on by [`AllocatorProfiler`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackingAllocator<A = System> {
    inner: A,
}

impl<A> TrackingAllocator<A> {
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }
}

unsafe impl<A: GlobalAlloc> GlobalAlloc for TrackingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc(layout);
        if !ptr.is_null() && TRACING.load(Ordering::Relaxed) {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if TRACING.load(Ordering::Relaxed) {
            record_dealloc(layout.size());
        }
        self.inner.dealloc(ptr, layout);
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc_zeroed(layout);
        if !ptr.is_null() && TRACING.load(Ordering::Relaxed) {
            record_alloc(layout.size());
        }
        ptr
    }
}

/// [`MemoryProfiler`] over the [`TrackingAllocator`] counters.
///
/// Only meaningful when a `TrackingAllocator` is the global allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllocatorProfiler;

impl MemoryProfiler for AllocatorProfiler {
    fn start(&mut self, _frame_depth: usize) {
        for class in 0..SIZE_CLASSES {
            LIVE_BYTES[class].store(0, Ordering::Relaxed);
            LIVE_BLOCKS[class].store(0, Ordering::Relaxed);
        }
        TRACING.store(true, Ordering::Relaxed);
    }

    fn stop(&mut self) {
        TRACING.store(false, Ordering::Relaxed);
    }

    fn is_tracing(&self) -> bool {
        TRACING.load(Ordering::Relaxed)
    }

    fn statistics(&self, group_by: GroupBy) -> Vec<AllocationStat> {
        let mut stats: Vec<AllocationStat> = (0..SIZE_CLASSES)
            .map(|class| AllocationStat {
                group: class_label(class),
                size_bytes: LIVE_BYTES[class].load(Ordering::Relaxed),
                blocks: LIVE_BLOCKS[class].load(Ordering::Relaxed),
            })
            .filter(|s| s.blocks > 0)
            .collect();

        match group_by {
            GroupBy::SizeClass => {
                stats.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
                stats
            }
            GroupBy::Total => vec![AllocationStat {
                group: "total".to_string(),
                size_bytes: stats.iter().map(|s| s.size_bytes).sum(),
                blocks: stats.iter().map(|s| s.blocks).sum(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_classes_are_power_of_two_bounds() {
        assert_eq!(size_class(0), 0);
        assert_eq!(size_class(1), 0);
        assert_eq!(size_class(2), 1);
        assert_eq!(size_class(3), 2);
        assert_eq!(size_class(64), 6);
        assert_eq!(size_class(65), 7);
        assert_eq!(size_class(usize::MAX), SIZE_CLASSES - 1);
        assert_eq!(class_label(6), "<= 64 B");
        assert_eq!(class_label(10), "<= 1 KiB");
        assert_eq!(class_label(21), "<= 2 MiB");
    }

    #[test]
    fn stat_line_rendering() {
        let s = AllocationStat {
            group: "<= 64 B".into(),
            size_bytes: 640,
            blocks: 10,
        };
        assert_eq!(s.to_string(), "<= 64 B: size=640 B, count=10, average=64 B");
    }

    // The only test touching the process-wide allocator counters.
    #[test]
    fn tracking_allocator_counts_while_tracing() {
        let alloc = TrackingAllocator::new(System);
        let mut profiler = AllocatorProfiler;
        let small = Layout::from_size_align(48, 8).unwrap();
        let large = Layout::from_size_align(4000, 8).unwrap();

        unsafe {
            let before = alloc.alloc(small);
            profiler.start(1);
            assert!(profiler.is_tracing());

            let a = alloc.alloc(small);
            let b = alloc.alloc_zeroed(small);
            let c = alloc.alloc(large);
            alloc.dealloc(before, small);

            let by_class = profiler.statistics(GroupBy::SizeClass);
            assert_eq!(by_class.len(), 2);
            assert_eq!(by_class[0].group, "<= 4 KiB");
            assert_eq!(by_class[0].size_bytes, 4000);
            assert_eq!(by_class[1].group, "<= 64 B");
            assert_eq!(by_class[1].blocks, 1);

            let total = profiler.statistics(GroupBy::Total);
            assert_eq!(total[0].size_bytes, 4048);

            profiler.stop();
            assert!(!profiler.is_tracing());
            alloc.dealloc(a, small);
            alloc.dealloc(b, small);
            alloc.dealloc(c, large);
        }
    }
}
