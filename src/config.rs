//! Configuration types for h5-footprint
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - The access configuration record consumed by the access layer
//! - Runtime configuration with validation

use crate::error::UsageError;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Default raw data chunk cache size (64 MiB)
pub const DEFAULT_CACHE_BYTES: usize = 64 * 1024 * 1024;

/// Default chunk cache hash table slot count (HDF5's own default, prime)
pub const DEFAULT_CACHE_SLOTS: usize = 521;

/// Default eviction weight: always evict fully read chunks first
pub const DEFAULT_CACHE_W0: f64 = 1.0;

/// Memory footprint probe for batches of HDF5 files
#[derive(Parser, Debug, Clone)]
#[command(
    name = "h5-footprint",
    version,
    about = "Measures allocator growth while opening and traversing a batch of HDF5 files",
    long_about = "Opens every file listed in FILE_LIST (one path per line), walks its object \
                  tree touching each dataset's extents, and writes one allocator sample per \
                  file to OUTPUT_CSV.\n\n\
                  All files and non-empty datasets stay open until the whole batch has been \
                  processed, so the samples show cumulative resident metadata.",
    after_help = "EXAMPLES:\n    \
        h5-footprint files.txt footprint.csv\n    \
        h5-footprint files.txt footprint.csv --on-disk -p\n    \
        h5-footprint files.txt footprint.csv --cache-bytes 268435456 --cache-slots 10007"
)]
pub struct CliArgs {
    /// FILE_LIST and OUTPUT_CSV
    ///
    /// Collected as a list so that a wrong count is reported with the
    /// usage line instead of a clap error.
    #[arg(value_name = "PATHS", num_args = 0..)]
    pub paths: Vec<PathBuf>,

    /// Use native on-disk I/O instead of reading each file into memory
    #[arg(long)]
    pub on_disk: bool,

    /// Do not tune the raw data chunk cache
    #[arg(long)]
    pub no_chunk_cache: bool,

    /// Raw data chunk cache size in bytes
    #[arg(long, default_value_t = DEFAULT_CACHE_BYTES, value_name = "BYTES")]
    pub cache_bytes: usize,

    /// Chunk cache hash table slots (should be prime)
    #[arg(long, default_value_t = DEFAULT_CACHE_SLOTS, value_name = "NUM")]
    pub cache_slots: usize,

    /// Chunk cache eviction weight in [0, 1]
    #[arg(long, default_value_t = DEFAULT_CACHE_W0, value_name = "W0")]
    pub cache_w0: f64,

    /// Which allocator counters to sample
    #[arg(long, value_enum, default_value_t = StatsSource::default(), value_name = "SOURCE")]
    pub alloc_stats: StatsSource,

    /// Show a progress bar and a summary at the end
    #[arg(short = 'p', long)]
    pub progress: bool,

    /// Verbose output (per-file debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Source of allocator statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatsSource {
    /// The container library's internal allocator counters
    Library,
    /// Every heap allocation made through the process global allocator
    Process,
}

impl Default for StatsSource {
    fn default() -> Self {
        if cfg!(feature = "hdf5") {
            StatsSource::Library
        } else {
            StatsSource::Process
        }
    }
}

impl StatsSource {
    pub fn name(&self) -> &'static str {
        match self {
            StatsSource::Library => "library",
            StatsSource::Process => "process",
        }
    }
}

/// I/O backend and chunk cache settings used to build an access descriptor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccessConfig {
    /// Serve each file from a full in-memory image
    pub in_memory: bool,

    /// Apply the chunk cache settings below (in-memory mode only)
    pub chunk_caching: bool,

    /// Chunk cache capacity in bytes
    pub cache_bytes: usize,

    /// Chunk cache hash table slots
    pub cache_slots: usize,

    /// Chunk cache eviction weight
    pub cache_w0: f64,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            in_memory: true,
            chunk_caching: true,
            cache_bytes: DEFAULT_CACHE_BYTES,
            cache_slots: DEFAULT_CACHE_SLOTS,
            cache_w0: DEFAULT_CACHE_W0,
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Text file with one container path per line
    pub file_list: PathBuf,

    /// CSV output path
    pub output_path: PathBuf,

    /// Access descriptor settings
    pub access: AccessConfig,

    /// Allocator statistics source
    pub stats_source: StatsSource,

    /// Show progress indicator and summary
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl ProbeConfig {
    /// Create configuration from CLI arguments
    ///
    /// Only the positional count is checked here. Cache parameters are
    /// validated when the access descriptor is built.
    pub fn from_args(args: CliArgs) -> Result<Self, UsageError> {
        let given = args.paths.len();
        let mut paths = args.paths.into_iter();
        let (file_list, output_path) = match (paths.next(), paths.next(), paths.next()) {
            (Some(list), Some(output), None) => (list, output),
            _ => return Err(UsageError { given }),
        };

        Ok(Self {
            file_list,
            output_path,
            access: AccessConfig {
                in_memory: !args.on_disk,
                chunk_caching: !args.no_chunk_cache,
                cache_bytes: args.cache_bytes,
                cache_slots: args.cache_slots,
                cache_w0: args.cache_w0,
            },
            stats_source: args.alloc_stats,
            show_progress: args.progress,
            verbose: args.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("h5-footprint").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults_match_hard_coded_flags() {
        let config = ProbeConfig::from_args(parse(&["list.txt", "out.csv"])).unwrap();
        assert_eq!(config.file_list, PathBuf::from("list.txt"));
        assert_eq!(config.output_path, PathBuf::from("out.csv"));
        assert_eq!(config.access, AccessConfig::default());
        assert!(config.access.in_memory);
        assert!(config.access.chunk_caching);
        assert_eq!(config.access.cache_bytes, 64 * 1024 * 1024);
        assert_eq!(config.access.cache_slots, 521);
        assert_eq!(config.access.cache_w0, 1.0);
        assert!(!config.show_progress);
    }

    #[test]
    fn test_access_flags() {
        let config = ProbeConfig::from_args(parse(&[
            "list.txt",
            "out.csv",
            "--on-disk",
            "--no-chunk-cache",
            "--cache-bytes",
            "1024",
            "--cache-slots",
            "10007",
            "--cache-w0",
            "0.75",
        ]))
        .unwrap();
        assert!(!config.access.in_memory);
        assert!(!config.access.chunk_caching);
        assert_eq!(config.access.cache_bytes, 1024);
        assert_eq!(config.access.cache_slots, 10007);
        assert_eq!(config.access.cache_w0, 0.75);
    }

    #[test]
    fn test_wrong_positional_count() {
        for args in [&[][..], &["only.txt"][..], &["a", "b", "c"][..]] {
            let err = ProbeConfig::from_args(parse(args)).unwrap_err();
            assert_eq!(err.given, args.len());
        }
    }

    #[test]
    fn test_stats_source_parsing() {
        let config =
            ProbeConfig::from_args(parse(&["l", "o", "--alloc-stats", "process"])).unwrap();
        assert_eq!(config.stats_source, StatsSource::Process);

        let config =
            ProbeConfig::from_args(parse(&["l", "o", "--alloc-stats", "library"])).unwrap();
        assert_eq!(config.stats_source, StatsSource::Library);
    }

    #[test]
    fn test_default_stats_source_follows_features() {
        let expected = if cfg!(feature = "hdf5") {
            StatsSource::Library
        } else {
            StatsSource::Process
        };
        assert_eq!(StatsSource::default(), expected);
    }
}
