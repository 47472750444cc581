//! Container library access
//!
//! This module is the seam between the batch walker and the library that
//! actually reads container files. The walker only needs:
//! - an access property list prepared once from an [`AccessDescriptor`]
//! - read-only file open, size query and close
//! - a listing of the members of a group, with each member's kind
//! - dataset open, extent query and close
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    BatchRunner                       │
//! │  - prepare(descriptor) once per batch               │
//! │  - open / members / open_dataset per file           │
//! └─────────────────────────┬───────────────────────────┘
//!                           │  ContainerBackend
//!           ┌───────────────┼────────────────┐
//!           ▼               ▼                ▼
//! ┌─────────────────┐ ┌───────────────┐ ┌───────────────┐
//! │  Hdf5Backend    │ │ MemoryBackend │ │ Unsupported   │
//! │  (feature hdf5) │ │ (synthetic)   │ │ (no backend)  │
//! └─────────────────┘ └───────────────┘ └───────────────┘
//! ```
//!
//! Handles are closed explicitly through `close(self)` so that close
//! failures surface as errors. Dropping a handle without closing it still
//! releases it, which is what happens to retained handles when a run
//! aborts.

#[cfg(feature = "hdf5")]
pub mod hdf5;
pub mod memory;
pub mod types;
pub mod unsupported;

#[cfg(feature = "hdf5")]
pub use self::hdf5::Hdf5Backend;
pub use memory::{HandleCounts, MemoryBackend, MemoryImage, MemoryImageBuilder};
pub use types::{Member, ObjectKey, ObjectKind};
pub use unsupported::UnsupportedBackend;

use crate::access::AccessDescriptor;
use crate::error::{ConfigError, ContainerResult};

/// A container library able to open files for reading
pub trait ContainerBackend {
    /// Library-specific access configuration built from a descriptor
    type Access;

    /// Open file handle
    type File: ContainerFile;

    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Translate the descriptor into library access settings
    ///
    /// Called once per batch, before any file is opened.
    fn prepare(&self, descriptor: &AccessDescriptor) -> Result<Self::Access, ConfigError>;

    /// Open a file read-only
    fn open(&self, path: &str, access: &Self::Access) -> ContainerResult<Self::File>;
}

/// An open container file
pub trait ContainerFile {
    /// Open dataset handle
    type Dataset: DatasetHandle;

    /// File size in bytes as reported by the library
    fn size(&self) -> ContainerResult<u64>;

    /// Members of the group at `group` (an absolute path, `/` is the root)
    fn members(&self, group: &str) -> ContainerResult<Vec<Member>>;

    /// Open the dataset at absolute path `path`
    fn open_dataset(&self, path: &str) -> ContainerResult<Self::Dataset>;

    /// Close the file
    fn close(self) -> ContainerResult<()>;
}

/// An open dataset
pub trait DatasetHandle {
    /// Current extent of every dimension; empty for a scalar dataspace
    fn extents(&self) -> ContainerResult<Vec<u64>>;

    /// Close the dataset
    fn close(self) -> ContainerResult<()>;
}

/// Join a group path and a member name into an absolute object path
pub fn join_path(group: &str, name: &str) -> String {
    if group == "/" || group.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", group.trim_end_matches('/'), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "a"), "/a");
        assert_eq!(join_path("", "a"), "/a");
        assert_eq!(join_path("/a", "b"), "/a/b");
        assert_eq!(join_path("/a/", "b"), "/a/b");
    }
}
