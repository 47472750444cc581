//! Input file list and CSV report
//!
//! The file list is plain text with one container path per line. Lines
//! are taken as they are: no trimming, no comment syntax, blank lines kept
//! (they fail later, at open time).
//!
//! The report is CSV with a fixed header and one row per sample. Each row
//! is flushed as soon as it is written so an aborted run keeps every
//! sample taken before the failure.

use crate::error::{ProbeError, Result};
use crate::walker::AllocationSample;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// CSV header line, in column order
pub const HEADER: &str = "total_alloc_bytes,curr_alloc_bytes,peak_alloc_bytes,acc_file_size";

/// Destination for samples as they are taken
pub trait SampleSink {
    fn record(&mut self, sample: &AllocationSample) -> Result<()>;
}

impl SampleSink for Vec<AllocationSample> {
    fn record(&mut self, sample: &AllocationSample) -> Result<()> {
        self.push(*sample);
        Ok(())
    }
}

/// Read the list of container paths
pub fn read_file_list(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| ProbeError::io(path, e))?;
    parse_file_list(BufReader::new(file)).map_err(|e| ProbeError::io(path, e))
}

/// Split a reader into lines, one path per line
pub fn parse_file_list<R: BufRead>(reader: R) -> std::io::Result<Vec<String>> {
    reader.lines().collect()
}

/// Format one sample as a CSV row (without newline)
pub fn format_row(sample: &AllocationSample) -> String {
    format!(
        "{},{},{},{}",
        sample.total_alloc_bytes,
        sample.curr_alloc_bytes,
        sample.peak_alloc_bytes,
        sample.acc_file_size
    )
}

/// CSV writer for allocation samples
pub struct CsvReport<W: Write> {
    writer: W,
    path: PathBuf,
    rows: usize,
}

impl CsvReport<BufWriter<File>> {
    /// Create (or truncate) the report file and write the header
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| ProbeError::io(path, e))?;
        Self::new(BufWriter::new(file), path)
    }
}

impl<W: Write> CsvReport<W> {
    /// Wrap a writer and write the header; `path` is only used in errors
    pub fn new(mut writer: W, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        writeln!(writer, "{HEADER}")
            .and_then(|_| writer.flush())
            .map_err(|e| ProbeError::io(&path, e))?;
        Ok(Self {
            writer,
            path,
            rows: 0,
        })
    }

    /// Data rows written so far
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SampleSink for CsvReport<W> {
    fn record(&mut self, sample: &AllocationSample) -> Result<()> {
        writeln!(self.writer, "{}", format_row(sample))
            .and_then(|_| self.writer.flush())
            .map_err(|e| ProbeError::io(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }
}
