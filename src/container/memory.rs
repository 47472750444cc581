//! In-memory container backend
//!
//! A synthetic container library: each "file" is a [`MemoryImage`] holding
//! a tree of groups, datasets and named datatypes, registered under a path.
//! Nothing touches the filesystem.
//!
//! The backend counts open file and dataset handles through
//! [`HandleCounts`], so callers can check exactly which handles a run left
//! open and when they were released. Close failures can be injected per
//! file path.
//!
//! # Example
//!
//! ```
//! use h5_footprint::container::{MemoryBackend, MemoryImage};
//!
//! let image = MemoryImage::builder(4096)
//!     .dataset("/raw/events", &[1200, 8])
//!     .dataset("/raw/empty", &[0, 8])
//!     .group("/meta")
//!     .build()
//!     .unwrap();
//!
//! let mut backend = MemoryBackend::new();
//! backend.insert("run-001.h5", image);
//! assert_eq!(backend.counts().open_files(), 0);
//! ```

use super::types::{Member, ObjectKey, ObjectKind};
use super::{ContainerBackend, ContainerFile, DatasetHandle};
use crate::access::AccessDescriptor;
use crate::error::{ConfigError, ContainerError, ContainerResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors while assembling a [`MemoryImage`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// Path is empty, relative or names the root where an object is needed
    #[error("Invalid object path '{path}'")]
    InvalidPath { path: String },

    /// Something other than a group already lives at this path
    #[error("Path conflict at '{path}'")]
    Conflict { path: String },

    /// Hard link target does not exist
    #[error("Link target '{path}' not found")]
    TargetNotFound { path: String },
}

#[derive(Debug, Clone)]
enum Object {
    Group(BTreeMap<String, usize>),
    Dataset(Vec<u64>),
    Datatype,
}

impl Object {
    fn kind(&self) -> ObjectKind {
        match self {
            Object::Group(_) => ObjectKind::Group,
            Object::Dataset(_) => ObjectKind::Dataset,
            Object::Datatype => ObjectKind::NamedDatatype,
        }
    }
}

/// Object tree and size of one synthetic container file
#[derive(Debug, Clone)]
pub struct MemoryImage {
    size: u64,
    /// Arena of objects; index 0 is the root group
    objects: Vec<Object>,
}

impl MemoryImage {
    /// Start building an image that reports `size` bytes
    pub fn builder(size: u64) -> MemoryImageBuilder {
        MemoryImageBuilder {
            image: MemoryImage {
                size,
                objects: vec![Object::Group(BTreeMap::new())],
            },
            error: None,
        }
    }

    /// Image with an empty root group
    pub fn empty(size: u64) -> Self {
        Self {
            size,
            objects: vec![Object::Group(BTreeMap::new())],
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of distinct dataset objects
    pub fn dataset_count(&self) -> usize {
        self.objects
            .iter()
            .filter(|o| matches!(o, Object::Dataset(_)))
            .count()
    }

    /// Number of distinct dataset objects whose first extent is zero
    /// (scalar datasets included)
    pub fn empty_dataset_count(&self) -> usize {
        self.objects
            .iter()
            .filter(|o| matches!(o, Object::Dataset(e) if e.first().copied().unwrap_or(0) == 0))
            .count()
    }

    fn resolve(&self, path: &str) -> Option<usize> {
        let mut current = 0;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            match &self.objects[current] {
                Object::Group(children) => current = *children.get(part)?,
                _ => return None,
            }
        }
        Some(current)
    }
}

/// Builder for [`MemoryImage`]
///
/// Intermediate groups are created as needed. The first error is kept and
/// returned from [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct MemoryImageBuilder {
    image: MemoryImage,
    error: Option<ImageError>,
}

impl MemoryImageBuilder {
    /// Add a group (and any missing parents)
    pub fn group(mut self, path: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.ensure_group(path) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Add a dataset with the given extents
    pub fn dataset(self, path: &str, extents: &[u64]) -> Self {
        self.add(path, Object::Dataset(extents.to_vec()))
    }

    /// Add a committed datatype
    pub fn datatype(self, path: &str) -> Self {
        self.add(path, Object::Datatype)
    }

    /// Add a second link named `path` to the existing object at `target`
    pub fn hard_link(mut self, path: &str, target: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        let result = match self.image.resolve(target) {
            Some(0) | None => Err(ImageError::TargetNotFound {
                path: target.to_string(),
            }),
            Some(id) => self.link(path, id),
        };
        if let Err(e) = result {
            self.error = Some(e);
        }
        self
    }

    pub fn build(self) -> Result<MemoryImage, ImageError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.image),
        }
    }

    fn add(mut self, path: &str, object: Object) -> Self {
        if self.error.is_some() {
            return self;
        }
        let id = self.image.objects.len();
        self.image.objects.push(object);
        if let Err(e) = self.link(path, id) {
            self.image.objects.pop();
            self.error = Some(e);
        }
        self
    }

    fn link(&mut self, path: &str, id: usize) -> Result<(), ImageError> {
        let (parent, name) = split_parent(path)?;
        let parent_id = self.ensure_group(parent)?;
        match &mut self.image.objects[parent_id] {
            Object::Group(children) => {
                if children.contains_key(name) {
                    return Err(ImageError::Conflict {
                        path: path.to_string(),
                    });
                }
                children.insert(name.to_string(), id);
                Ok(())
            }
            _ => Err(ImageError::Conflict {
                path: parent.to_string(),
            }),
        }
    }

    fn ensure_group(&mut self, path: &str) -> Result<usize, ImageError> {
        if !path.starts_with('/') {
            return Err(ImageError::InvalidPath {
                path: path.to_string(),
            });
        }
        let mut current = 0;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            let next = match &self.image.objects[current] {
                Object::Group(children) => children.get(part).copied(),
                _ => {
                    return Err(ImageError::Conflict {
                        path: path.to_string(),
                    })
                }
            };
            current = match next {
                Some(id) => id,
                None => {
                    let id = self.image.objects.len();
                    self.image.objects.push(Object::Group(BTreeMap::new()));
                    if let Object::Group(children) = &mut self.image.objects[current] {
                        children.insert(part.to_string(), id);
                    }
                    id
                }
            };
        }
        match self.image.objects[current] {
            Object::Group(_) => Ok(current),
            _ => Err(ImageError::Conflict {
                path: path.to_string(),
            }),
        }
    }
}

fn split_parent(path: &str) -> Result<(&str, &str), ImageError> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) if !trimmed[idx + 1..].is_empty() => {
            let parent = if idx == 0 { "/" } else { &trimmed[..idx] };
            Ok((parent, &trimmed[idx + 1..]))
        }
        _ => Err(ImageError::InvalidPath {
            path: path.to_string(),
        }),
    }
}

/// Live handle counters shared by a [`MemoryBackend`] and its handles
#[derive(Debug, Default)]
pub struct HandleCounts {
    files: AtomicUsize,
    datasets: AtomicUsize,
    files_opened: AtomicUsize,
    datasets_opened: AtomicUsize,
    prepared: AtomicUsize,
}

impl HandleCounts {
    /// File handles currently open
    pub fn open_files(&self) -> usize {
        self.files.load(Ordering::Relaxed)
    }

    /// Dataset handles currently open
    pub fn open_datasets(&self) -> usize {
        self.datasets.load(Ordering::Relaxed)
    }

    /// File opens since the backend was created
    pub fn files_opened(&self) -> usize {
        self.files_opened.load(Ordering::Relaxed)
    }

    /// Dataset opens since the backend was created
    pub fn datasets_opened(&self) -> usize {
        self.datasets_opened.load(Ordering::Relaxed)
    }

    /// Number of times an access descriptor was prepared
    pub fn prepared(&self) -> usize {
        self.prepared.load(Ordering::Relaxed)
    }
}

/// Container backend serving [`MemoryImage`]s by path
#[derive(Debug, Default)]
pub struct MemoryBackend {
    images: HashMap<String, Arc<MemoryImage>>,
    failing_closes: HashSet<String>,
    counts: Arc<HandleCounts>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image under `path`, replacing any previous one
    pub fn insert(&mut self, path: impl Into<String>, image: MemoryImage) {
        self.images.insert(path.into(), Arc::new(image));
    }

    /// Make closing the file at `path` fail
    pub fn fail_close(&mut self, path: impl Into<String>) {
        self.failing_closes.insert(path.into());
    }

    /// Shared handle counters
    pub fn counts(&self) -> Arc<HandleCounts> {
        Arc::clone(&self.counts)
    }
}

impl ContainerBackend for MemoryBackend {
    type Access = AccessDescriptor;
    type File = MemoryFile;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn prepare(&self, descriptor: &AccessDescriptor) -> Result<AccessDescriptor, ConfigError> {
        self.counts.prepared.fetch_add(1, Ordering::Relaxed);
        Ok(*descriptor)
    }

    fn open(&self, path: &str, _access: &AccessDescriptor) -> ContainerResult<MemoryFile> {
        let image = self.images.get(path).ok_or_else(|| ContainerError::Open {
            operation: "H5Fopen",
            path: path.to_string(),
            reason: "no such file".into(),
        })?;

        self.counts.files.fetch_add(1, Ordering::Relaxed);
        self.counts.files_opened.fetch_add(1, Ordering::Relaxed);

        Ok(MemoryFile {
            path: path.to_string(),
            image: Arc::clone(image),
            counts: Arc::clone(&self.counts),
            fail_close: self.failing_closes.contains(path),
            open: true,
        })
    }
}

/// Open file handle from a [`MemoryBackend`]
#[derive(Debug)]
pub struct MemoryFile {
    path: String,
    image: Arc<MemoryImage>,
    counts: Arc<HandleCounts>,
    fail_close: bool,
    open: bool,
}

impl MemoryFile {
    pub fn path(&self) -> &str {
        &self.path
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.counts.files.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

impl ContainerFile for MemoryFile {
    type Dataset = MemoryDataset;

    fn size(&self) -> ContainerResult<u64> {
        Ok(self.image.size)
    }

    fn members(&self, group: &str) -> ContainerResult<Vec<Member>> {
        let id = self.image.resolve(group).ok_or_else(|| ContainerError::Open {
            operation: "H5Gopen",
            path: group.to_string(),
            reason: "no such group".into(),
        })?;

        match &self.image.objects[id] {
            Object::Group(children) => Ok(children
                .iter()
                .map(|(name, &child)| {
                    Member::new(
                        name.clone(),
                        self.image.objects[child].kind(),
                        ObjectKey::new(child.to_string()),
                    )
                })
                .collect()),
            _ => Err(ContainerError::Open {
                operation: "H5Gopen",
                path: group.to_string(),
                reason: "not a group".into(),
            }),
        }
    }

    fn open_dataset(&self, path: &str) -> ContainerResult<MemoryDataset> {
        let extents = match self.image.resolve(path).map(|id| &self.image.objects[id]) {
            Some(Object::Dataset(extents)) => extents.clone(),
            _ => {
                return Err(ContainerError::Open {
                    operation: "H5Dopen",
                    path: path.to_string(),
                    reason: "no such dataset".into(),
                })
            }
        };

        self.counts.datasets.fetch_add(1, Ordering::Relaxed);
        self.counts.datasets_opened.fetch_add(1, Ordering::Relaxed);

        Ok(MemoryDataset {
            path: path.to_string(),
            extents,
            counts: Arc::clone(&self.counts),
            open: true,
        })
    }

    fn close(mut self) -> ContainerResult<()> {
        self.release();
        if self.fail_close {
            return Err(ContainerError::Close {
                operation: "H5Fclose",
                path: self.path.clone(),
                reason: "injected close failure".into(),
            });
        }
        Ok(())
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        self.release();
    }
}

/// Open dataset handle from a [`MemoryFile`]
#[derive(Debug)]
pub struct MemoryDataset {
    path: String,
    extents: Vec<u64>,
    counts: Arc<HandleCounts>,
    open: bool,
}

impl MemoryDataset {
    pub fn path(&self) -> &str {
        &self.path
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.counts.datasets.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

impl DatasetHandle for MemoryDataset {
    fn extents(&self) -> ContainerResult<Vec<u64>> {
        Ok(self.extents.clone())
    }

    fn close(mut self) -> ContainerResult<()> {
        self.release();
        Ok(())
    }
}

impl Drop for MemoryDataset {
    fn drop(&mut self) {
        self.release();
    }
}
