//! Progress reporting for measurement runs
//!
//! Provides a per-file progress bar using indicatif and the header and
//! summary printed around a run.

use crate::walker::{AllocationSample, BatchStats};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Progress bar advanced once per traversed file
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a progress bar for `total_files` files
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        if let Ok(template) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(template.progress_chars("=> "));
        }

        Self { bar }
    }

    /// Hidden bar, for runs without progress output
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Mark one more file as done
    pub fn advance(&self, path: &str, acc_file_size: u64) {
        self.bar.set_message(format!(
            "{} | Total: {}",
            file_label(path),
            format_size(acc_file_size, BINARY)
        ));
        self.bar.inc(1);
    }

    /// Files completed so far
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Last path component, for compact progress messages
fn file_label(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of the run
pub fn print_summary(stats: &BatchStats, last: Option<&AllocationSample>, output: &str) {
    let duration_secs = stats.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        stats.files as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    println!("{}", style("Batch Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Files:").bold(), format_number(stats.files));
    println!(
        "  {} {}",
        style("Total Size:").bold(),
        format_size(stats.total_bytes, BINARY)
    );
    println!(
        "  {} {} ({} kept open, {} empty)",
        style("Datasets:").bold(),
        format_number(stats.traversal.datasets),
        format_number(stats.retained_datasets),
        format_number(stats.traversal.closed_empty)
    );
    println!(
        "  {} {}",
        style("Objects:").bold(),
        format_number(stats.traversal.objects)
    );
    if let Some(sample) = last {
        println!(
            "  {} {} current, {} peak",
            style("Allocated:").bold(),
            format_size(sample.curr_alloc_bytes, BINARY),
            format_size(sample.peak_alloc_bytes, BINARY)
        );
    }
    println!(
        "  {} {:.1}s ({:.1} files/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    println!("  {} {}", style("Report:").bold(), output);
    println!();
}

/// Print a header at the start of the run
pub fn print_header(file_list: &str, files: usize, output: &str, access: &str) {
    println!();
    println!(
        "{} {}",
        style("h5-footprint").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {} ({} files)", style("Input:").bold(), file_list, files);
    println!("  {} {}", style("Access:").bold(), access);
    println!("  {} {}", style("Output:").bold(), output);
    println!();
}
