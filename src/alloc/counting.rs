//! Counting global allocator
//!
//! Wraps another [`GlobalAlloc`] and keeps total, current and peak byte
//! counters. Install it in the binary:
//!
//! ```ignore
//! #[global_allocator]
//! static GLOBAL: CountingAllocator = CountingAllocator::system();
//! ```
//!
//! Only allocations routed through the Rust global allocator are counted;
//! memory a C library obtains from `malloc` directly is not.

use super::{AllocSnapshot, AllocatorStats};
use crate::error::StatsError;
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Global allocator wrapper with byte counters
#[derive(Debug)]
pub struct CountingAllocator<A = System> {
    inner: A,
    total: AtomicU64,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingAllocator<System> {
    /// Counting wrapper around the system allocator
    pub const fn system() -> Self {
        Self::new(System)
    }
}

impl<A> CountingAllocator<A> {
    pub const fn new(inner: A) -> Self {
        Self {
            inner,
            total: AtomicU64::new(0),
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Current counter values
    pub fn snapshot(&self) -> AllocSnapshot {
        AllocSnapshot {
            total: self.total.load(Ordering::Relaxed),
            current: self.current.load(Ordering::Relaxed) as u64,
            peak: self.peak.load(Ordering::Relaxed) as u64,
        }
    }

    fn record_alloc(&self, size: usize) {
        self.total.fetch_add(size as u64, Ordering::Relaxed);
        let now = self.current.fetch_add(size, Ordering::Relaxed) + size;
        self.peak.fetch_max(now, Ordering::Relaxed);
    }

    fn record_dealloc(&self, size: usize) {
        self.current.fetch_sub(size, Ordering::Relaxed);
    }
}

unsafe impl<A: GlobalAlloc> GlobalAlloc for CountingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc(layout);
        if !ptr.is_null() {
            self.record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc_zeroed(layout);
        if !ptr.is_null() {
            self.record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        self.inner.dealloc(ptr, layout);
        self.record_dealloc(layout.size());
    }

    // Counted as a free of the old block and an allocation of the new one
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = self.inner.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            self.record_dealloc(layout.size());
            self.record_alloc(new_size);
        }
        new_ptr
    }
}

/// [`AllocatorStats`] over a static [`CountingAllocator`]
#[derive(Debug, Clone, Copy)]
pub struct ProcessStats {
    allocator: &'static CountingAllocator,
}

impl ProcessStats {
    pub fn new(allocator: &'static CountingAllocator) -> Self {
        Self { allocator }
    }
}

impl AllocatorStats for ProcessStats {
    fn source(&self) -> &'static str {
        "process"
    }

    fn query(&self) -> Result<AllocSnapshot, StatsError> {
        Ok(self.allocator.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_track_alloc_and_free() {
        let allocator = CountingAllocator::system();
        let small = Layout::from_size_align(64, 8).unwrap();
        let large = Layout::from_size_align(4096, 8).unwrap();

        unsafe {
            let a = allocator.alloc(small);
            let b = allocator.alloc_zeroed(large);
            assert!(!a.is_null() && !b.is_null());
            assert_eq!(
                allocator.snapshot(),
                AllocSnapshot {
                    total: 4160,
                    current: 4160,
                    peak: 4160,
                }
            );

            allocator.dealloc(b, large);
            let snap = allocator.snapshot();
            assert_eq!(snap.total, 4160);
            assert_eq!(snap.current, 64);
            assert_eq!(snap.peak, 4160);

            let a = allocator.realloc(a, small, 128);
            assert!(!a.is_null());
            let snap = allocator.snapshot();
            assert_eq!(snap.total, 4288);
            assert_eq!(snap.current, 128);
            assert_eq!(snap.peak, 4160);

            allocator.dealloc(a, Layout::from_size_align(128, 8).unwrap());
        }

        assert_eq!(allocator.snapshot().current, 0);
    }

    #[test]
    fn test_process_stats_reads_static_allocator() {
        static COUNTER: CountingAllocator = CountingAllocator::system();
        let stats = ProcessStats::new(&COUNTER);
        assert_eq!(stats.source(), "process");
        assert_eq!(stats.query().unwrap(), AllocSnapshot::default());

        let layout = Layout::from_size_align(32, 8).unwrap();
        unsafe {
            let p = COUNTER.alloc(layout);
            assert_eq!(stats.query().unwrap().current, 32);
            COUNTER.dealloc(p, layout);
        }
        assert_eq!(stats.query().unwrap().total, 32);
    }
}
