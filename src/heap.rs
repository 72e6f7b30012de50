//! Heap accounting through a tracking global allocator.
//!
//! [`TrackingAllocator`] wraps the system allocator and keeps live and peak
//! byte counts per size class. The binary installs it as the global
//! allocator; when it is not installed (unit tests, embedding) every counter
//! stays at zero.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Largest allocation counted in the small object space.
pub const SMALL_OBJECT_LIMIT: usize = 256;
/// Largest allocation counted in the medium object space.
pub const MEDIUM_OBJECT_LIMIT: usize = 64 * 1024;

/// Allocation size classes reported as heap spaces.
pub const SPACE_NAMES: [&str; 3] = [
    "small_object_space",
    "medium_object_space",
    "large_object_space",
];

struct SpaceCounters {
    live: AtomicUsize,
    peak: AtomicUsize,
}

impl SpaceCounters {
    const fn new() -> Self {
        Self {
            live: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn add(&self, size: usize) {
        let live = self.live.fetch_add(size, Ordering::Relaxed) + size;
        self.peak.fetch_max(live, Ordering::Relaxed);
    }

    fn sub(&self, size: usize) {
        self.live.fetch_sub(size, Ordering::Relaxed);
    }
}

static SPACES: [SpaceCounters; 3] = [
    SpaceCounters::new(),
    SpaceCounters::new(),
    SpaceCounters::new(),
];
static LIVE: AtomicUsize = AtomicUsize::new(0);
static PEAK: AtomicUsize = AtomicUsize::new(0);
static ALLOCATIONS: AtomicUsize = AtomicUsize::new(0);

fn space_index(size: usize) -> usize {
    if size <= SMALL_OBJECT_LIMIT {
        0
    } else if size <= MEDIUM_OBJECT_LIMIT {
        1
    } else {
        2
    }
}

fn record_alloc(size: usize) {
    SPACES[space_index(size)].add(size);
    let live = LIVE.fetch_add(size, Ordering::Relaxed) + size;
    PEAK.fetch_max(live, Ordering::Relaxed);
    ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
}

fn record_dealloc(size: usize) {
    SPACES[space_index(size)].sub(size);
    LIVE.fetch_sub(size, Ordering::Relaxed);
}

/// System allocator wrapper that counts live and peak bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackingAllocator;

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        record_dealloc(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            record_dealloc(layout.size());
            record_alloc(new_size);
        }
        new_ptr
    }
}

/// Point-in-time view of one size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceUsage {
    /// Size class name.
    pub name: &'static str,
    /// Bytes currently live in the class.
    pub live: usize,
    /// High-water mark of live bytes in the class.
    pub peak: usize,
}

/// Point-in-time view of the tracked heap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapUsage {
    /// Bytes currently live.
    pub live: usize,
    /// High-water mark of live bytes.
    pub peak: usize,
    /// Number of allocations served since start.
    pub allocations: usize,
    /// Per size class usage.
    pub spaces: Vec<SpaceUsage>,
}

/// Read the allocator counters.
pub fn usage() -> HeapUsage {
    HeapUsage {
        live: LIVE.load(Ordering::Relaxed),
        peak: PEAK.load(Ordering::Relaxed),
        allocations: ALLOCATIONS.load(Ordering::Relaxed),
        spaces: SPACE_NAMES
            .iter()
            .zip(SPACES.iter())
            .map(|(&name, counters)| {
                let live = counters.live.load(Ordering::Relaxed);
                // peak is updated after live, so a concurrent reader can see live > peak
                let peak = counters.peak.load(Ordering::Relaxed).max(live);
                SpaceUsage { name, live, peak }
            })
            .collect(),
    }
}
