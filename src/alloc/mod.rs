//! Allocator statistics
//!
//! The batch walker samples allocator counters through the
//! [`AllocatorStats`] service so that the source can be swapped:
//! - [`ProcessStats`]: a [`CountingAllocator`] installed as the process
//!   `#[global_allocator]`
//! - `LibraryStats` (feature `hdf5`): the container library's own
//!   `H5get_alloc_stats` counters
//! - any fake implementation in tests

mod counting;
#[cfg(feature = "hdf5")]
mod library;

pub use counting::{CountingAllocator, ProcessStats};
#[cfg(feature = "hdf5")]
pub use library::LibraryStats;

use crate::error::StatsError;

/// One reading of allocator counters, in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocSnapshot {
    /// Bytes allocated since start, frees not subtracted
    pub total: u64,

    /// Bytes currently allocated
    pub current: u64,

    /// High-water mark of `current`
    pub peak: u64,
}

/// Source of process-wide allocator statistics
pub trait AllocatorStats {
    /// Short source name for logs
    fn source(&self) -> &'static str;

    /// Read the counters now
    fn query(&self) -> Result<AllocSnapshot, StatsError>;
}

impl<T: AllocatorStats + ?Sized> AllocatorStats for &T {
    fn source(&self) -> &'static str {
        (**self).source()
    }

    fn query(&self) -> Result<AllocSnapshot, StatsError> {
        (**self).query()
    }
}

impl<T: AllocatorStats + ?Sized> AllocatorStats for Box<T> {
    fn source(&self) -> &'static str {
        (**self).source()
    }

    fn query(&self) -> Result<AllocSnapshot, StatsError> {
        (**self).query()
    }
}
