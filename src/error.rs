//! Error types for h5-footprint
//!
//! This module defines the error hierarchy for a measurement run:
//! - Access descriptor / chunk cache configuration errors
//! - Container file and dataset open, query and close errors
//! - Allocator statistics errors
//! - Usage errors (wrong argument count)
//!
//! Every error is fatal for the run. Nothing here is retried or downgraded,
//! so there is no `is_recoverable()` style classification.

use std::path::PathBuf;
use thiserror::Error;

/// Usage line printed when the positional arguments are wrong
pub const USAGE: &str = "Usage: h5-footprint /path/to/file_list.txt /path/to/output.csv";

/// Top-level error type for a measurement run
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Access descriptor could not be built or applied
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Container file or dataset operation failed
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    /// Allocator statistics could not be sampled
    #[error("Allocator statistics error: {0}")]
    Stats(#[from] StatsError),

    /// Wrong command line
    #[error("{0}")]
    Usage(#[from] UsageError),

    /// I/O errors on the file list or the CSV output
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProbeError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProbeError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Access descriptor and chunk cache configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Chunk cache slot count must be positive
    #[error("Invalid chunk cache slot count {slots}: must be at least 1")]
    InvalidCacheSlots { slots: usize },

    /// Eviction weight outside [0, 1]
    #[error("Invalid chunk cache eviction weight {w0}: must be between 0.0 and 1.0")]
    InvalidEvictionWeight { w0: f64 },

    /// The container library rejected a backend or cache parameter
    #[error("{operation} failed: {reason}")]
    Apply {
        operation: &'static str,
        reason: String,
    },

    /// Requested allocator statistics source is not compiled in
    #[error("Allocator statistics source '{source_name}' is not available: {reason}")]
    UnsupportedStatsSource {
        source_name: &'static str,
        reason: String,
    },
}

/// Container file and dataset errors
///
/// `operation` names the library call that failed (e.g. `H5Fopen`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// File or dataset failed to open
    #[error("{operation}: failed to open '{path}': {reason}")]
    Open {
        operation: &'static str,
        path: String,
        reason: String,
    },

    /// Metadata query (size, members, extents) failed on an open object
    #[error("{operation}: query on '{path}' failed: {reason}")]
    Query {
        operation: &'static str,
        path: String,
        reason: String,
    },

    /// File or dataset failed to close
    #[error("{operation}: failed to close '{path}': {reason}")]
    Close {
        operation: &'static str,
        path: String,
        reason: String,
    },
}

impl ContainerError {
    /// Name of the failing library operation
    pub fn operation(&self) -> &'static str {
        match self {
            ContainerError::Open { operation, .. }
            | ContainerError::Query { operation, .. }
            | ContainerError::Close { operation, .. } => operation,
        }
    }

    /// Path of the file or object the operation was applied to
    pub fn path(&self) -> &str {
        match self {
            ContainerError::Open { path, .. }
            | ContainerError::Query { path, .. }
            | ContainerError::Close { path, .. } => path,
        }
    }

    /// Returns true if this is a close failure
    pub fn is_close(&self) -> bool {
        matches!(self, ContainerError::Close { .. })
    }
}

/// Allocator statistics errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    /// The statistics query itself failed
    #[error("{operation} failed with status {status}")]
    QueryFailed { operation: &'static str, status: i32 },
}

/// Wrong command line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{USAGE}")]
pub struct UsageError {
    /// Number of arguments that were given
    pub given: usize,
}

/// Result type alias for ProbeError
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Result type alias for ContainerError
pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_error_accessors() {
        let err = ContainerError::Close {
            operation: "H5Fclose",
            path: "/data/a.h5".into(),
            reason: "still in use".into(),
        };
        assert_eq!(err.operation(), "H5Fclose");
        assert_eq!(err.path(), "/data/a.h5");
        assert!(err.is_close());
        assert_eq!(
            err.to_string(),
            "H5Fclose: failed to close '/data/a.h5': still in use"
        );
    }

    #[test]
    fn test_error_conversion() {
        let err = ContainerError::Open {
            operation: "H5Fopen",
            path: "missing.h5".into(),
            reason: "no such file".into(),
        };
        let probe: ProbeError = err.into();
        assert!(matches!(probe, ProbeError::Container(_)));

        let cfg: ProbeError = ConfigError::InvalidCacheSlots { slots: 0 }.into();
        assert!(matches!(cfg, ProbeError::Config(_)));
    }

    #[test]
    fn test_usage_error_prints_usage_line() {
        let err = UsageError { given: 3 };
        assert_eq!(err.to_string(), USAGE);
        assert_eq!(ProbeError::from(err).to_string(), USAGE);
    }
}
