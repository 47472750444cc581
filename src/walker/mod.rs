//! Batch walker
//!
//! Opens container files one after another, walks each object tree and
//! samples allocator statistics after every file.
//!
//! # Architecture
//!
//! ```text
//!                 ┌─────────────────────────┐
//!                 │      BatchRunner        │
//!                 │  - one file at a time   │
//!                 │  - running size total   │
//!                 └───────────┬─────────────┘
//!                             │
//!          ┌──────────────────┼──────────────────┐
//!          │                  │                  │
//!   ┌──────▼──────┐    ┌──────▼──────┐    ┌──────▼──────┐
//!   │visit_objects│    │  Allocator  │    │ SampleSink  │
//!   │ ExtentProbe │    │Stats::query │    │  (CSV row)  │
//!   └──────┬──────┘    └─────────────┘    └─────────────┘
//!          │
//!   ┌──────▼──────────┐
//!   │ HandleRegistry  │
//!   │ (until teardown)│
//!   └─────────────────┘
//! ```

pub mod batch;
pub mod traverse;

pub use batch::{AllocationSample, BatchOutcome, BatchRunner, BatchStats, HandleRegistry};
pub use traverse::{visit_objects, ExtentProbe, ObjectVisitor, TraversalContext, TraversalCounts};
