//! Benchmarks for h5-footprint
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use h5_footprint::access::AccessDescriptor;
use h5_footprint::alloc::{AllocSnapshot, AllocatorStats};
use h5_footprint::container::{ContainerBackend, MemoryBackend, MemoryImage};
use h5_footprint::error::StatsError;
use h5_footprint::walker::{visit_objects, BatchRunner, ExtentProbe, TraversalContext};

/// 16 groups of 64 datasets, every fourth one empty
fn wide_image() -> MemoryImage {
    let mut builder = MemoryImage::builder(1 << 20);
    for g in 0..16 {
        for d in 0..64 {
            let rows = if d % 4 == 0 { 0 } else { 1024 };
            builder = builder.dataset(&format!("/group_{g:02}/ds_{d:03}"), &[rows, 8]);
        }
    }
    builder.build().unwrap()
}

struct ZeroStats;

impl AllocatorStats for ZeroStats {
    fn source(&self) -> &'static str {
        "zero"
    }

    fn query(&self) -> Result<AllocSnapshot, StatsError> {
        Ok(AllocSnapshot::default())
    }
}

fn benchmark_traversal(c: &mut Criterion) {
    let mut backend = MemoryBackend::new();
    backend.insert("wide.h5", wide_image());
    let descriptor = AccessDescriptor::in_memory();
    let access = backend.prepare(&descriptor).unwrap();

    c.bench_function("visit_objects_1024_datasets", |b| {
        let file = backend.open("wide.h5", &access).unwrap();
        b.iter(|| {
            let mut ctx = TraversalContext::new();
            visit_objects(&file, &mut ExtentProbe, &mut ctx).unwrap();
            black_box(ctx.counts());
        })
    });
}

fn benchmark_batch(c: &mut Criterion) {
    let mut backend = MemoryBackend::new();
    let paths: Vec<String> = (0..32).map(|i| format!("run_{i:03}.h5")).collect();
    for path in &paths {
        backend.insert(path.clone(), wide_image());
    }
    let runner = BatchRunner::new(backend, ZeroStats, AccessDescriptor::in_memory());

    c.bench_function("batch_32_files", |b| {
        b.iter(|| {
            let mut samples = Vec::new();
            let outcome = runner.run(&paths, &mut samples).unwrap();
            black_box(outcome.stats);
        })
    });
}

criterion_group!(benches, benchmark_traversal, benchmark_batch);
criterion_main!(benches);
