//! Access descriptor construction
//!
//! An [`AccessDescriptor`] selects how every file in a batch is read:
//! straight from the native filesystem, or from a full in-memory image
//! with an optionally tuned raw data chunk cache. It is built once,
//! before the first open, and shared read-only by every open afterwards.
//!
//! The descriptor is plain data. Backends turn it into their own access
//! property list in [`ContainerBackend::prepare`](crate::container::ContainerBackend::prepare),
//! which is where the library can still reject a parameter.

use crate::config::AccessConfig;
use crate::error::ConfigError;
use humansize::{format_size, BINARY};
use std::fmt;
use tracing::{debug, warn};

/// Raw data chunk cache parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkCache {
    /// Hash table slots; should be a prime roughly 100x the number of
    /// chunks resident at once
    pub slots: usize,

    /// Cache capacity in bytes
    pub bytes: usize,

    /// Eviction weight in [0, 1]; 1.0 always evicts fully read chunks first
    pub w0: f64,
}

/// I/O mode selected by the descriptor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IoMode {
    /// Native filesystem access with library defaults
    OnDisk,

    /// Whole file image held in process memory
    InMemory {
        /// Growth increment of the memory image; files are read-only so
        /// it is never used
        increment: usize,
        /// Write the image back to disk on close
        backing_store: bool,
        /// Chunk cache override, if any
        chunk_cache: Option<ChunkCache>,
    },
}

/// Immutable access configuration shared by every open in a batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccessDescriptor {
    mode: IoMode,
}

impl AccessDescriptor {
    /// Default on-disk access
    pub fn on_disk() -> Self {
        Self {
            mode: IoMode::OnDisk,
        }
    }

    /// In-memory access without chunk cache tuning
    pub fn in_memory() -> Self {
        Self {
            mode: IoMode::InMemory {
                increment: 0,
                backing_store: false,
                chunk_cache: None,
            },
        }
    }

    pub fn mode(&self) -> IoMode {
        self.mode
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self.mode, IoMode::InMemory { .. })
    }

    /// Chunk cache override, only ever set for in-memory access
    pub fn chunk_cache(&self) -> Option<ChunkCache> {
        match self.mode {
            IoMode::InMemory { chunk_cache, .. } => chunk_cache,
            IoMode::OnDisk => None,
        }
    }

    fn with_chunk_cache(mut self, cache: ChunkCache) -> Self {
        if let IoMode::InMemory {
            ref mut chunk_cache,
            ..
        } = self.mode
        {
            *chunk_cache = Some(cache);
        }
        self
    }
}

impl fmt::Display for AccessDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            IoMode::OnDisk => write!(f, "on-disk"),
            IoMode::InMemory {
                chunk_cache: None, ..
            } => write!(f, "in-memory"),
            IoMode::InMemory {
                chunk_cache: Some(cache),
                ..
            } => write!(
                f,
                "in-memory, chunk cache {} / {} slots / w0 {}",
                format_size(cache.bytes, BINARY),
                cache.slots,
                cache.w0
            ),
        }
    }
}

/// Build the access descriptor for a batch
///
/// On-disk access ignores every cache setting. In-memory access applies
/// the chunk cache only when `chunk_caching` is set. Invalid cache
/// parameters are rejected even though nothing has been opened yet, since
/// the run would abort at the first open anyway.
pub fn build_access_descriptor(config: &AccessConfig) -> Result<AccessDescriptor, ConfigError> {
    if !config.in_memory {
        debug!("Using on-disk access");
        return Ok(AccessDescriptor::on_disk());
    }

    let descriptor = AccessDescriptor::in_memory();
    if !config.chunk_caching {
        debug!("Using in-memory access without chunk cache tuning");
        return Ok(descriptor);
    }

    let cache = ChunkCache {
        slots: config.cache_slots,
        bytes: config.cache_bytes,
        w0: config.cache_w0,
    };
    validate_chunk_cache(&cache)?;

    debug!(
        slots = cache.slots,
        bytes = cache.bytes,
        w0 = cache.w0,
        "Using in-memory access with chunk cache"
    );
    Ok(descriptor.with_chunk_cache(cache))
}

fn validate_chunk_cache(cache: &ChunkCache) -> Result<(), ConfigError> {
    if cache.slots == 0 {
        return Err(ConfigError::InvalidCacheSlots { slots: cache.slots });
    }

    if !(0.0..=1.0).contains(&cache.w0) {
        return Err(ConfigError::InvalidEvictionWeight { w0: cache.w0 });
    }

    if !is_prime(cache.slots) {
        warn!(
            slots = cache.slots,
            "Chunk cache slot count is not prime; hash collisions will be more frequent"
        );
    }

    Ok(())
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}
