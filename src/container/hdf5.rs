//! HDF5 container backend
//!
//! Wraps the `hdf5` crate. The access descriptor becomes a file access
//! property list using the core (in-memory) driver and the raw data chunk
//! cache; it is built once in [`prepare`](ContainerBackend::prepare) and
//! shared by every open.
//!
//! Only hard links are followed when listing a group. Soft links may
//! dangle and external links point into other files, so neither is
//! reported as a member.
//!
//! The library closes handles when they are dropped. `File::close` is used
//! for files so that a failing `H5Fclose` is reported; datasets are closed
//! by drop.

use super::types::{Member, ObjectKey, ObjectKind};
use super::{ContainerBackend, ContainerFile, DatasetHandle};
use crate::access::{AccessDescriptor, IoMode};
use crate::error::{ConfigError, ContainerError, ContainerResult};
use hdf5::plist::FileAccess;
use hdf5::{Dataset, File, LinkInfo, LinkType, LocationType};
use hdf5_sys::h5f::H5Fget_filesize;
use tracing::{debug, trace};

/// Container backend backed by libhdf5
#[derive(Debug, Default, Clone, Copy)]
pub struct Hdf5Backend;

impl Hdf5Backend {
    pub fn new() -> Self {
        Self
    }
}

/// Library call whose failure the last `finish()` of a mode stands for
fn finish_operation(mode: IoMode) -> &'static str {
    match mode {
        IoMode::OnDisk => "H5Pcreate",
        IoMode::InMemory {
            chunk_cache: None, ..
        } => "H5Pset_fapl_core",
        IoMode::InMemory {
            chunk_cache: Some(_),
            ..
        } => "H5Pset_cache",
    }
}

fn apply_error(operation: &'static str) -> impl FnOnce(hdf5::Error) -> ConfigError {
    move |e| ConfigError::Apply {
        operation,
        reason: e.to_string(),
    }
}

impl ContainerBackend for Hdf5Backend {
    type Access = FileAccess;
    type File = Hdf5File;

    fn name(&self) -> &'static str {
        "hdf5"
    }

    fn prepare(&self, descriptor: &AccessDescriptor) -> Result<FileAccess, ConfigError> {
        let mode = descriptor.mode();
        let mut builder = FileAccess::build();

        if let IoMode::InMemory {
            increment,
            backing_store,
            chunk_cache,
        } = mode
        {
            builder.core_options(increment, backing_store);

            if let Some(cache) = chunk_cache {
                // Check the driver on its own so its failure keeps its name
                builder.finish().map_err(apply_error("H5Pset_fapl_core"))?;
                builder.chunk_cache(cache.slots, cache.bytes, cache.w0);
            }
        }

        let fapl = builder.finish().map_err(apply_error(finish_operation(mode)))?;
        debug!(in_memory = descriptor.is_in_memory(), "Prepared HDF5 file access list");
        Ok(fapl)
    }

    fn open(&self, path: &str, access: &FileAccess) -> ContainerResult<Hdf5File> {
        let open_error = |e: hdf5::Error| ContainerError::Open {
            operation: "H5Fopen",
            path: path.to_string(),
            reason: e.to_string(),
        };

        let file = File::with_options()
            .set_access_plist(access)
            .map_err(open_error)?
            .open(path)
            .map_err(open_error)?;

        Ok(Hdf5File {
            path: path.to_string(),
            file,
        })
    }
}

/// Open HDF5 file
#[derive(Debug)]
pub struct Hdf5File {
    path: String,
    file: File,
}

impl ContainerFile for Hdf5File {
    type Dataset = Hdf5Dataset;

    fn size(&self) -> ContainerResult<u64> {
        let mut size = 0;
        // SAFETY: the id belongs to an open file owned by self
        let status = unsafe { H5Fget_filesize(self.file.id(), &mut size) };
        if status < 0 {
            return Err(ContainerError::Query {
                operation: "H5Fget_filesize",
                path: self.path.clone(),
                reason: format!("status {}", status),
            });
        }
        Ok(size)
    }

    fn members(&self, group: &str) -> ContainerResult<Vec<Member>> {
        let handle = self.file.group(group).map_err(|e| ContainerError::Open {
            operation: "H5Gopen",
            path: format!("{}:{}", self.path, group),
            reason: e.to_string(),
        })?;

        let query_error = |operation: &'static str, name: &str, e: hdf5::Error| {
            ContainerError::Query {
                operation,
                path: format!("{}:{}", self.path, super::join_path(group, name)),
                reason: e.to_string(),
            }
        };

        let names = handle
            .iter_visit_default(
                Vec::new(),
                |_, name: &str, info: LinkInfo, names: &mut Vec<String>| {
                    if matches!(info.link_type, LinkType::Hard) {
                        names.push(name.to_string());
                    } else {
                        trace!(group, link = name, "Skipping soft or external link");
                    }
                    true
                },
            )
            .map_err(|e| query_error("H5Literate", "", e))?;

        names
            .into_iter()
            .map(|name| {
                let info = handle
                    .loc_info_by_name(&name)
                    .map_err(|e| query_error("H5Oget_info_by_name", &name, e))?;
                let kind = match info.loc_type {
                    LocationType::Group => ObjectKind::Group,
                    LocationType::Dataset => ObjectKind::Dataset,
                    LocationType::NamedDatatype => ObjectKind::NamedDatatype,
                    #[allow(unreachable_patterns)]
                    _ => ObjectKind::Unknown,
                };
                let key = ObjectKey::new(format!("{}:{:?}", info.fileno, info.token));
                Ok(Member::new(name, kind, key))
            })
            .collect()
    }

    fn open_dataset(&self, path: &str) -> ContainerResult<Hdf5Dataset> {
        let dataset = self.file.dataset(path).map_err(|e| ContainerError::Open {
            operation: "H5Dopen",
            path: format!("{}:{}", self.path, path),
            reason: e.to_string(),
        })?;

        Ok(Hdf5Dataset {
            path: format!("{}:{}", self.path, path),
            dataset,
        })
    }

    fn close(self) -> ContainerResult<()> {
        let path = self.path;
        self.file.close().map_err(|e| ContainerError::Close {
            operation: "H5Fclose",
            path,
            reason: e.to_string(),
        })
    }
}

/// Open HDF5 dataset
#[derive(Debug)]
pub struct Hdf5Dataset {
    path: String,
    dataset: Dataset,
}

impl DatasetHandle for Hdf5Dataset {
    fn extents(&self) -> ContainerResult<Vec<u64>> {
        let space = self.dataset.space().map_err(|e| ContainerError::Query {
            operation: "H5Dget_space",
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(space.shape().into_iter().map(|d| d as u64).collect())
    }

    fn close(self) -> ContainerResult<()> {
        drop(self.dataset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::build_access_descriptor;
    use crate::alloc::LibraryStats;
    use crate::config::AccessConfig;
    use crate::walker::BatchRunner;
    use std::path::{Path, PathBuf};
    use tempfile::{tempdir, TempDir};

    /// Writes `main.h5` and `other.h5` into a scratch dir
    ///
    /// main.h5:
    ///   /raw/adc     [16, 4]
    ///   /raw/empty   [0, 4]
    ///   /alias       hard link to /raw/adc
    ///   /dangling    soft link to /missing
    ///   /ext         external link to other.h5:/
    ///
    /// other.h5:
    ///   /far/data    [8]
    fn write_files() -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let main = dir.path().join("main.h5");
        let other = dir.path().join("other.h5");

        {
            let file = File::create(&other).unwrap();
            let far = file.create_group("far").unwrap();
            far.new_dataset::<f64>().shape([8]).create("data").unwrap();
        }
        {
            let file = File::create(&main).unwrap();
            let raw = file.create_group("raw").unwrap();
            raw.new_dataset::<f64>().shape([16, 4]).create("adc").unwrap();
            raw.new_dataset::<f64>().shape([0, 4]).create("empty").unwrap();
            file.link_hard("/raw/adc", "alias").unwrap();
            file.link_soft("/missing", "dangling").unwrap();
            file.link_external(other.to_str().unwrap(), "/", "ext").unwrap();
        }

        (dir, main)
    }

    fn path_str(path: &Path) -> &str {
        path.to_str().unwrap()
    }

    #[test]
    fn test_finish_operation_names() {
        assert_eq!(finish_operation(AccessDescriptor::on_disk().mode()), "H5Pcreate");
        assert_eq!(
            finish_operation(AccessDescriptor::in_memory().mode()),
            "H5Pset_fapl_core"
        );
        let tuned = build_access_descriptor(&AccessConfig::default()).unwrap();
        assert_eq!(finish_operation(tuned.mode()), "H5Pset_cache");
    }

    #[test]
    fn test_prepare_every_mode() {
        let backend = Hdf5Backend::new();
        let no_cache = AccessConfig {
            chunk_caching: false,
            ..AccessConfig::default()
        };
        for descriptor in [
            AccessDescriptor::on_disk(),
            build_access_descriptor(&no_cache).unwrap(),
            build_access_descriptor(&AccessConfig::default()).unwrap(),
        ] {
            assert!(backend.prepare(&descriptor).is_ok(), "{}", descriptor);
        }
    }

    #[test]
    fn test_members_follow_hard_links_only() {
        let (_dir, main) = write_files();
        let backend = Hdf5Backend::new();
        let access = backend.prepare(&AccessDescriptor::on_disk()).unwrap();
        let file = backend.open(path_str(&main), &access).unwrap();

        let mut root = file.members("/").unwrap();
        root.sort_by(|a, b| a.name.cmp(&b.name));
        let names: Vec<_> = root.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["alias", "raw"]);
        assert_eq!(root[0].kind, ObjectKind::Dataset);
        assert_eq!(root[1].kind, ObjectKind::Group);

        let raw = file.members("/raw").unwrap();
        let adc = raw.iter().find(|m| m.name == "adc").unwrap();
        assert_eq!(adc.key, root[0].key);
        let empty = raw.iter().find(|m| m.name == "empty").unwrap();
        assert_ne!(empty.key, adc.key);

        file.close().unwrap();
    }

    #[test]
    fn test_extents_and_size() {
        let (_dir, main) = write_files();
        let backend = Hdf5Backend::new();
        let access = backend.prepare(&AccessDescriptor::on_disk()).unwrap();
        let file = backend.open(path_str(&main), &access).unwrap();

        assert_eq!(
            file.size().unwrap(),
            std::fs::metadata(&main).unwrap().len()
        );

        let adc = file.open_dataset("/raw/adc").unwrap();
        assert_eq!(adc.extents().unwrap(), vec![16, 4]);
        let empty = file.open_dataset("/raw/empty").unwrap();
        assert_eq!(empty.extents().unwrap(), vec![0, 4]);

        let err = file.open_dataset("/raw/none").unwrap_err();
        assert_eq!(err.operation(), "H5Dopen");

        adc.close().unwrap();
        empty.close().unwrap();
        file.close().unwrap();
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        let backend = Hdf5Backend::new();
        let access = backend.prepare(&AccessDescriptor::on_disk()).unwrap();
        let missing = dir.path().join("missing.h5");
        let err = backend.open(path_str(&missing), &access).unwrap_err();
        assert_eq!(err.operation(), "H5Fopen");
    }

    #[test]
    fn test_batch_over_real_file() {
        let (_dir, main) = write_files();
        let descriptor = build_access_descriptor(&AccessConfig::default()).unwrap();
        let runner = BatchRunner::new(Hdf5Backend::new(), LibraryStats::new(), descriptor);

        let paths = vec![main.display().to_string()];
        let mut sink = Vec::new();
        let outcome = runner.run(&paths, &mut sink).unwrap();

        // alias, raw, raw/empty; raw/adc is the alias target. Neither the
        // dangling link nor the external file is visited.
        let traversal = outcome.stats.traversal;
        assert_eq!(traversal.objects, 3);
        assert_eq!(traversal.groups, 1);
        assert_eq!(traversal.datasets, 2);
        assert_eq!(traversal.closed_empty, 1);
        assert_eq!(outcome.stats.retained_datasets, 1);
        assert_eq!(
            outcome.stats.total_bytes,
            std::fs::metadata(&main).unwrap().len()
        );
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[0].acc_file_size, 0);
        assert_eq!(sink[1].acc_file_size, outcome.stats.total_bytes);
    }
}
