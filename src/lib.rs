//! h5-footprint - Memory Footprint Probe for HDF5 File Batches
//!
//! Measures how much heap the container library (or the whole process)
//! holds while a batch of HDF5 files is opened and every object tree is
//! walked, with all file handles and every non-empty dataset handle kept
//! open until the batch is done.
//!
//! # Features
//!
//! - **Cumulative Sampling**: One allocator sample before the first file
//!   and one after each file, paired with the running total of file sizes.
//!
//! - **Configurable Access**: Files are read either from disk or from a
//!   full in-memory image, with an optionally tuned raw data chunk cache.
//!
//! - **Pluggable Backends**: The container library sits behind the
//!   [`container::ContainerBackend`] trait. The real HDF5 backend is
//!   behind the default `hdf5` feature; an in-memory synthetic backend
//!   drives the tests and benchmarks.
//!
//! - **CSV Output**: Samples are written and flushed row by row, so an
//!   aborted run keeps everything measured before the failure.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────────────┐
//! │  file_list.txt   │      │  CLI flags (clap)        │
//! └────────┬─────────┘      └────────────┬─────────────┘
//!          │                             │ build_access_descriptor
//!          ▼                             ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        BatchRunner                           │
//! │  sample ─► for each path:                                    │
//! │              open ─► size ─► visit_objects(ExtentProbe)      │
//! │              ─► sample ─► retain handles                     │
//! │           ─► close every retained handle                     │
//! └───────┬──────────────────────┬───────────────────┬──────────┘
//!         │ ContainerBackend     │ AllocatorStats    │ SampleSink
//!         ▼                      ▼                   ▼
//! ┌───────────────┐   ┌────────────────────┐   ┌───────────────┐
//! │ HDF5 / memory │   │ H5get_alloc_stats  │   │  output.csv   │
//! │               │   │ or global counter  │   │               │
//! └───────────────┘   └────────────────────┘   └───────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Default: in-memory access with a 64 MiB chunk cache
//! h5-footprint files.txt footprint.csv
//!
//! # Native on-disk access, with progress
//! h5-footprint files.txt footprint.csv --on-disk -p
//! ```

pub mod access;
pub mod alloc;
pub mod config;
pub mod container;
pub mod error;
pub mod progress;
pub mod report;
pub mod walker;

pub use access::{build_access_descriptor, AccessDescriptor};
pub use config::{AccessConfig, CliArgs, ProbeConfig, StatsSource};
pub use error::{ProbeError, Result};
pub use report::{CsvReport, SampleSink};
pub use walker::{AllocationSample, BatchOutcome, BatchRunner};
