//! Batch traversal and sampling
//!
//! [`BatchRunner`] opens each file of a batch in order, walks its object
//! tree with [`ExtentProbe`], and records one allocator sample per file
//! tagged with the running total of file sizes.
//!
//! Handles are released late on purpose: every file handle and every
//! non-empty dataset handle goes into a [`HandleRegistry`] and stays open
//! until the whole batch has been sampled. Each sample therefore reflects
//! the metadata of all files opened so far, not just the last one.
//!
//! ```text
//! baseline sample (acc = 0)
//! for each path:
//!     Unopened ──open──▶ Open ──size, walk──▶ Traversed ──sample──▶ Retained
//! teardown:
//!     Retained ──close datasets, close file──▶ Closed
//! ```

use super::traverse::{visit_objects, ExtentProbe, TraversalContext, TraversalCounts};
use crate::access::AccessDescriptor;
use crate::alloc::{AllocSnapshot, AllocatorStats};
use crate::container::{ContainerBackend, ContainerFile, DatasetHandle};
use crate::error::{ContainerError, Result};
use crate::progress::ProgressReporter;
use crate::report::SampleSink;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One row of the output time series
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationSample {
    pub total_alloc_bytes: u64,
    pub curr_alloc_bytes: u64,
    pub peak_alloc_bytes: u64,
    /// Sum of the sizes of every file opened so far
    pub acc_file_size: u64,
}

impl AllocationSample {
    pub fn new(snapshot: AllocSnapshot, acc_file_size: u64) -> Self {
        Self {
            total_alloc_bytes: snapshot.total,
            curr_alloc_bytes: snapshot.current,
            peak_alloc_bytes: snapshot.peak,
            acc_file_size,
        }
    }
}

/// Totals for a finished batch
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    /// Files opened and traversed
    pub files: u64,
    /// Sum of file sizes
    pub total_bytes: u64,
    /// Traversal counters over all files
    pub traversal: TraversalCounts,
    /// Dataset handles held open until teardown
    pub retained_datasets: u64,
    /// Wall time from the baseline sample to the end of teardown
    pub duration: Duration,
}

/// Result of a batch run
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Baseline sample followed by one sample per file
    pub samples: Vec<AllocationSample>,
    pub stats: BatchStats,
}

/// A file handle and the dataset handles it left open
struct RetainedFile<F: ContainerFile> {
    path: String,
    file: F,
    datasets: Vec<F::Dataset>,
}

/// Owns every handle opened during a batch until teardown
///
/// Entries are kept in insertion order. A path listed twice gets two
/// entries, so each handle is still closed exactly once.
pub struct HandleRegistry<F: ContainerFile> {
    entries: Vec<RetainedFile<F>>,
}

impl<F: ContainerFile> Default for HandleRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ContainerFile> HandleRegistry<F> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Take ownership of a traversed file and its open datasets
    pub fn retain(&mut self, path: impl Into<String>, file: F, datasets: Vec<F::Dataset>) {
        self.entries.push(RetainedFile {
            path: path.into(),
            file,
            datasets,
        });
    }

    /// Number of file handles held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of dataset handles held
    pub fn open_datasets(&self) -> usize {
        self.entries.iter().map(|e| e.datasets.len()).sum()
    }

    /// Most recent file handle retained under `path`
    pub fn get(&self, path: &str) -> Option<&F> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.path == path)
            .map(|e| &e.file)
    }

    /// Close every dataset handle, then every file handle
    ///
    /// Every handle is closed once even if an earlier close fails; the
    /// first failure is returned.
    pub fn close_all(self) -> std::result::Result<(), ContainerError> {
        let mut first_error = None;
        let mut files = Vec::with_capacity(self.entries.len());

        for entry in self.entries {
            for dataset in entry.datasets {
                if let Err(e) = dataset.close() {
                    warn!("{}", e);
                    first_error.get_or_insert(e);
                }
            }
            files.push((entry.path, entry.file));
        }

        for (path, file) in files {
            debug!(path = %path, "Closing file");
            if let Err(e) = file.close() {
                warn!("{}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Runs a measurement batch against one backend and statistics source
pub struct BatchRunner<B: ContainerBackend, S: AllocatorStats> {
    backend: B,
    stats: S,
    descriptor: AccessDescriptor,
    progress: Option<ProgressReporter>,
}

impl<B: ContainerBackend, S: AllocatorStats> BatchRunner<B, S> {
    pub fn new(backend: B, stats: S, descriptor: AccessDescriptor) -> Self {
        Self {
            backend,
            stats,
            descriptor,
            progress: None,
        }
    }

    /// Report per-file progress
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Process `paths` in order, pushing every sample to `sink` as soon as
    /// it is taken
    ///
    /// Any error aborts the batch. Samples already pushed stay in the sink;
    /// handles opened so far are released by drop.
    pub fn run<K: SampleSink>(&self, paths: &[String], sink: &mut K) -> Result<BatchOutcome> {
        let start = Instant::now();
        let access = self.backend.prepare(&self.descriptor)?;

        info!(
            backend = self.backend.name(),
            alloc_stats = self.stats.source(),
            in_memory = self.descriptor.is_in_memory(),
            files = paths.len(),
            "Starting batch"
        );

        let mut samples = Vec::with_capacity(paths.len() + 1);
        let mut acc_file_size: u64 = 0;
        self.sample(acc_file_size, sink, &mut samples)?;

        let mut registry = HandleRegistry::new();
        let mut traversal = TraversalCounts::default();

        for path in paths {
            let file = self.backend.open(path, &access)?;

            let size = file.size()?;
            acc_file_size = acc_file_size.saturating_add(size);

            let mut ctx = TraversalContext::new();
            visit_objects(&file, &mut ExtentProbe, &mut ctx)?;

            self.sample(acc_file_size, sink, &mut samples)?;

            let counts = ctx.counts();
            debug!(
                path = %path,
                size,
                acc_file_size,
                objects = counts.objects,
                datasets = counts.datasets,
                retained = counts.retained(),
                "File traversed"
            );
            traversal.merge(counts);
            registry.retain(path.clone(), file, ctx.into_retained());

            if let Some(ref progress) = self.progress {
                progress.advance(path, acc_file_size);
            }
        }

        let retained_datasets = registry.open_datasets() as u64;
        let files = registry.len() as u64;
        debug!(files, retained_datasets, "Releasing retained handles");
        registry.close_all()?;
        drop(access);

        let stats = BatchStats {
            files,
            total_bytes: acc_file_size,
            traversal,
            retained_datasets,
            duration: start.elapsed(),
        };
        info!(
            files = stats.files,
            total_bytes = stats.total_bytes,
            datasets = stats.traversal.datasets,
            "Batch complete"
        );

        Ok(BatchOutcome { samples, stats })
    }

    fn sample<K: SampleSink>(
        &self,
        acc_file_size: u64,
        sink: &mut K,
        samples: &mut Vec<AllocationSample>,
    ) -> Result<()> {
        let snapshot = self.stats.query()?;
        let sample = AllocationSample::new(snapshot, acc_file_size);
        sink.record(&sample)?;
        samples.push(sample);
        Ok(())
    }
}
