//! h5-footprint - Memory Footprint Probe for HDF5 File Batches
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use h5_footprint::access::{build_access_descriptor, AccessDescriptor};
use h5_footprint::alloc::{AllocatorStats, CountingAllocator, ProcessStats};
use h5_footprint::config::{CliArgs, ProbeConfig, StatsSource};
use h5_footprint::container::ContainerBackend;
use h5_footprint::error::{ConfigError, ProbeError, UsageError};
use h5_footprint::progress::{print_header, print_summary, ProgressReporter};
use h5_footprint::report::{read_file_list, CsvReport};
use h5_footprint::walker::BatchRunner;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "hdf5")]
use h5_footprint::alloc::LibraryStats;
#[cfg(feature = "hdf5")]
use h5_footprint::container::Hdf5Backend;
#[cfg(not(feature = "hdf5"))]
use h5_footprint::container::UnsupportedBackend;

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator::system();

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(ProbeError::Usage(usage)) = e.downcast_ref::<ProbeError>() {
                println!("{}", usage);
            } else {
                // ProbeError messages already embed their source
                error!("{}", e);
                println!("Error: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                e.print().context("Failed to print help")?;
                return Ok(());
            }
            _ => {
                let _ = e.print();
                let given = std::env::args_os().len().saturating_sub(1);
                return Err(ProbeError::from(UsageError { given }).into());
            }
        },
    };

    // Positional count is checked before anything touches the filesystem
    let config = ProbeConfig::from_args(args).map_err(ProbeError::from)?;

    setup_logging(config.verbose)?;

    let descriptor = build_access_descriptor(&config.access).map_err(ProbeError::from)?;
    let stats = select_stats(config.stats_source).map_err(ProbeError::from)?;

    let paths = read_file_list(&config.file_list)?;
    info!(
        file_list = %config.file_list.display(),
        files = paths.len(),
        "Loaded file list"
    );

    // The output is created only once the run can actually start
    let report = CsvReport::create(&config.output_path)?;

    if config.show_progress {
        print_header(
            &config.file_list.display().to_string(),
            paths.len(),
            &config.output_path.display().to_string(),
            &descriptor.to_string(),
        );
    }

    #[cfg(feature = "hdf5")]
    let backend = Hdf5Backend::new();
    #[cfg(not(feature = "hdf5"))]
    let backend = UnsupportedBackend;

    execute(&config, backend, stats, descriptor, &paths, report)
}

/// Pick the allocator statistics service
fn select_stats(source: StatsSource) -> Result<Box<dyn AllocatorStats>, ConfigError> {
    match source {
        StatsSource::Process => Ok(Box::new(ProcessStats::new(&GLOBAL))),
        #[cfg(feature = "hdf5")]
        StatsSource::Library => Ok(Box::new(LibraryStats::new())),
        #[cfg(not(feature = "hdf5"))]
        StatsSource::Library => Err(ConfigError::UnsupportedStatsSource {
            source_name: source.name(),
            reason: "built without the `hdf5` feature, use --alloc-stats process".to_string(),
        }),
    }
}

/// Run the batch and report the outcome
fn execute<B: ContainerBackend>(
    config: &ProbeConfig,
    backend: B,
    stats: Box<dyn AllocatorStats>,
    descriptor: AccessDescriptor,
    paths: &[String],
    mut report: CsvReport<std::io::BufWriter<std::fs::File>>,
) -> Result<()> {
    let progress = if config.show_progress {
        Some(ProgressReporter::new(paths.len() as u64))
    } else {
        None
    };

    let mut runner = BatchRunner::new(backend, stats, descriptor);
    if let Some(ref p) = progress {
        p.set_status("Opening files...");
        runner = runner.with_progress(p.clone());
    }

    let outcome = match runner.run(paths, &mut report) {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(ref p) = progress {
                p.finish("Batch aborted");
            }
            return Err(e.into());
        }
    };

    if let Some(ref p) = progress {
        p.finish("Batch completed");
        print_summary(
            &outcome.stats,
            outcome.samples.last(),
            &report.path().display().to_string(),
        );
    }

    info!(
        rows = report.rows(),
        output = %report.path().display(),
        "Report written"
    );

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("h5_footprint=debug,warn")
    } else {
        EnvFilter::new("h5_footprint=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
