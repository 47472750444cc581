//! Object tree traversal
//!
//! [`visit_objects`] walks every object reachable from the root group of
//! an open file, depth-first, members in name order. An object reachable
//! through several hard links is visited once, under the first path the
//! walk reaches it by. The root group itself is not reported.
//!
//! Side effects live in an [`ObjectVisitor`], which receives the file, the
//! object's absolute path, its member entry and the mutable
//! [`TraversalContext`]. [`ExtentProbe`] is the visitor used for
//! measurement runs.

use crate::container::{ContainerFile, DatasetHandle, Member, ObjectKind};
use crate::error::ContainerResult;
use std::collections::HashSet;
use tracing::trace;

/// Counters for one or more traversals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalCounts {
    /// Objects visited (root group excluded)
    pub objects: u64,
    /// Groups visited
    pub groups: u64,
    /// Datasets visited
    pub datasets: u64,
    /// Datasets closed during traversal because their first extent is 0
    pub closed_empty: u64,
}

impl TraversalCounts {
    pub fn merge(&mut self, other: TraversalCounts) {
        self.objects += other.objects;
        self.groups += other.groups;
        self.datasets += other.datasets;
        self.closed_empty += other.closed_empty;
    }

    /// Datasets left open by the traversal
    pub fn retained(&self) -> u64 {
        self.datasets - self.closed_empty
    }
}

/// Mutable state threaded through one file's traversal
#[derive(Debug)]
pub struct TraversalContext<D> {
    retained: Vec<D>,
    counts: TraversalCounts,
}

impl<D> Default for TraversalContext<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> TraversalContext<D> {
    pub fn new() -> Self {
        Self {
            retained: Vec::new(),
            counts: TraversalCounts::default(),
        }
    }

    /// Keep a dataset handle open past the traversal
    pub fn retain(&mut self, dataset: D) {
        self.retained.push(dataset);
    }

    /// Number of dataset handles currently held
    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }

    pub fn counts(&self) -> TraversalCounts {
        self.counts
    }

    /// Hand the retained dataset handles over to the caller
    pub fn into_retained(self) -> Vec<D> {
        self.retained
    }
}

/// Per-object callback
pub trait ObjectVisitor<F: ContainerFile> {
    fn visit(
        &mut self,
        file: &F,
        path: &str,
        member: &Member,
        ctx: &mut TraversalContext<F::Dataset>,
    ) -> ContainerResult<()>;
}

/// Visit every object in `file`
pub fn visit_objects<F, V>(
    file: &F,
    visitor: &mut V,
    ctx: &mut TraversalContext<F::Dataset>,
) -> ContainerResult<()>
where
    F: ContainerFile,
    V: ObjectVisitor<F>,
{
    let mut seen = HashSet::new();
    let mut stack: Vec<(String, Member)> = Vec::new();
    push_members(file, "/", &mut stack)?;

    while let Some((path, member)) = stack.pop() {
        if !seen.insert(member.key.clone()) {
            trace!(path = %path, key = %member.key, "Skipping already visited object");
            continue;
        }

        ctx.counts.objects += 1;
        visitor.visit(file, &path, &member, ctx)?;

        if member.kind.is_group() {
            push_members(file, &path, &mut stack)?;
        }
    }

    Ok(())
}

/// Push a group's members so that the smallest name is popped first
fn push_members<F: ContainerFile>(
    file: &F,
    group: &str,
    stack: &mut Vec<(String, Member)>,
) -> ContainerResult<()> {
    let mut members = file.members(group)?;
    members.sort_by(|a, b| a.name.cmp(&b.name));
    for member in members.into_iter().rev() {
        let path = crate::container::join_path(group, &member.name);
        stack.push((path, member));
    }
    Ok(())
}

/// Touches each dataset's extents
///
/// Datasets are opened and their extents read. A dataset whose first
/// extent is 0 (or that has no dimensions at all) is closed right away;
/// every other dataset handle is retained in the context and stays open
/// until the batch is torn down. Groups are only counted.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtentProbe;

impl<F: ContainerFile> ObjectVisitor<F> for ExtentProbe {
    fn visit(
        &mut self,
        file: &F,
        path: &str,
        member: &Member,
        ctx: &mut TraversalContext<F::Dataset>,
    ) -> ContainerResult<()> {
        match member.kind {
            ObjectKind::Dataset => {
                ctx.counts.datasets += 1;

                let dataset = file.open_dataset(path)?;
                let extents = dataset.extents()?;
                // Rank is assumed to be at most 2; only the leading extent matters.
                let leading = extents.first().copied().unwrap_or(0);

                if leading == 0 {
                    trace!(path, "Closing empty dataset");
                    dataset.close()?;
                    ctx.counts.closed_empty += 1;
                } else {
                    ctx.retain(dataset);
                }
            }
            ObjectKind::Group => ctx.counts.groups += 1,
            ObjectKind::NamedDatatype | ObjectKind::Unknown => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessDescriptor;
    use crate::container::{ContainerBackend, MemoryBackend, MemoryImage};

    /// Records every visited path
    #[derive(Default)]
    struct PathRecorder(Vec<String>);

    impl<F: ContainerFile> ObjectVisitor<F> for PathRecorder {
        fn visit(
            &mut self,
            _file: &F,
            path: &str,
            _member: &Member,
            _ctx: &mut TraversalContext<F::Dataset>,
        ) -> ContainerResult<()> {
            self.0.push(path.to_string());
            Ok(())
        }
    }

    fn backend_with(image: MemoryImage) -> MemoryBackend {
        let mut backend = MemoryBackend::new();
        backend.insert("f.h5", image);
        backend
    }

    #[test]
    fn test_depth_first_name_order() {
        let backend = backend_with(
            MemoryImage::builder(1)
                .dataset("/z", &[1])
                .dataset("/b/y", &[1])
                .dataset("/b/a/x", &[1])
                .group("/a")
                .build()
                .unwrap(),
        );
        let access = backend.prepare(&AccessDescriptor::on_disk()).unwrap();
        let file = backend.open("f.h5", &access).unwrap();

        let mut recorder = PathRecorder::default();
        let mut ctx = TraversalContext::new();
        visit_objects(&file, &mut recorder, &mut ctx).unwrap();

        assert_eq!(recorder.0, ["/a", "/b", "/b/a", "/b/a/x", "/b/y", "/z"]);
        assert_eq!(ctx.counts().objects, 6);
    }

    #[test]
    fn test_hard_links_visited_once() {
        let backend = backend_with(
            MemoryImage::builder(1)
                .dataset("/g/data", &[5, 5])
                .hard_link("/alias", "/g/data")
                .hard_link("/h", "/g")
                .build()
                .unwrap(),
        );
        let counts = backend.counts();
        let access = backend.prepare(&AccessDescriptor::on_disk()).unwrap();
        let file = backend.open("f.h5", &access).unwrap();

        let mut recorder = PathRecorder::default();
        let mut ctx = TraversalContext::new();
        visit_objects(&file, &mut recorder, &mut ctx).unwrap();
        assert_eq!(recorder.0, ["/alias", "/g"]);

        let mut ctx = TraversalContext::new();
        visit_objects(&file, &mut ExtentProbe, &mut ctx).unwrap();
        assert_eq!(ctx.counts().datasets, 1);
        assert_eq!(ctx.counts().groups, 1);
        assert_eq!(counts.datasets_opened(), 1);
    }

    #[test]
    fn test_extent_probe_closes_only_empty_datasets() {
        let image = MemoryImage::builder(1)
            .dataset("/full", &[10, 2])
            .dataset("/empty", &[0, 2])
            .dataset("/scalar", &[])
            .dataset("/grp/one_d", &[3])
            .datatype("/dtype")
            .build()
            .unwrap();
        let expected_open = image.dataset_count() - image.empty_dataset_count();
        let backend = backend_with(image);
        let counts = backend.counts();
        let access = backend.prepare(&AccessDescriptor::in_memory()).unwrap();
        let file = backend.open("f.h5", &access).unwrap();

        let mut ctx = TraversalContext::new();
        visit_objects(&file, &mut ExtentProbe, &mut ctx).unwrap();

        assert_eq!(expected_open, 2);
        assert_eq!(counts.open_datasets(), expected_open);
        assert_eq!(ctx.retained_len(), expected_open);
        assert_eq!(
            ctx.counts(),
            TraversalCounts {
                objects: 6,
                groups: 1,
                datasets: 4,
                closed_empty: 2,
            }
        );
        assert_eq!(ctx.counts().retained(), 2);

        drop(ctx.into_retained());
        assert_eq!(counts.open_datasets(), 0);
    }

    #[test]
    fn test_empty_file() {
        let backend = backend_with(MemoryImage::empty(0));
        let access = backend.prepare(&AccessDescriptor::on_disk()).unwrap();
        let file = backend.open("f.h5", &access).unwrap();

        let mut ctx = TraversalContext::new();
        visit_objects(&file, &mut ExtentProbe, &mut ctx).unwrap();
        assert_eq!(ctx.counts(), TraversalCounts::default());
    }
}
