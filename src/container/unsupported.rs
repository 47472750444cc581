//! Placeholder backend for builds without a container library
//!
//! Accepts any access descriptor and fails every open, naming the missing
//! feature. An empty file list still produces a valid baseline-only report.

use super::{ContainerBackend, ContainerFile, DatasetHandle, Member};
use crate::access::AccessDescriptor;
use crate::error::{ConfigError, ContainerError, ContainerResult};

/// Backend used when the `hdf5` feature is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBackend;

/// Never constructed
#[derive(Debug)]
pub enum NoFile {}

/// Never constructed
#[derive(Debug)]
pub enum NoDataset {}

impl ContainerBackend for UnsupportedBackend {
    type Access = AccessDescriptor;
    type File = NoFile;

    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn prepare(&self, descriptor: &AccessDescriptor) -> Result<AccessDescriptor, ConfigError> {
        Ok(*descriptor)
    }

    fn open(&self, path: &str, _access: &AccessDescriptor) -> ContainerResult<NoFile> {
        Err(ContainerError::Open {
            operation: "H5Fopen",
            path: path.to_string(),
            reason: "built without container support (enable the `hdf5` feature)".into(),
        })
    }
}

impl ContainerFile for NoFile {
    type Dataset = NoDataset;

    fn size(&self) -> ContainerResult<u64> {
        match *self {}
    }

    fn members(&self, _group: &str) -> ContainerResult<Vec<Member>> {
        match *self {}
    }

    fn open_dataset(&self, _path: &str) -> ContainerResult<NoDataset> {
        match *self {}
    }

    fn close(self) -> ContainerResult<()> {
        match self {}
    }
}

impl DatasetHandle for NoDataset {
    fn extents(&self) -> ContainerResult<Vec<u64>> {
        match *self {}
    }

    fn close(self) -> ContainerResult<()> {
        match self {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_always_fails() {
        let backend = UnsupportedBackend;
        let access = backend.prepare(&AccessDescriptor::in_memory()).unwrap();
        let err = backend.open("a.h5", &access).unwrap_err();
        assert_eq!(err.operation(), "H5Fopen");
        assert_eq!(err.path(), "a.h5");
    }
}
