//! Dataflow runtime.
//!
//! Work is described as a [`TaskGraph`] of closures, each annotated with the regions of data it
//! reads and writes. Dependencies between tasks are derived from these annotations, and the graph
//! is executed either sequentially in submission order, or concurrently on the rayon thread pool
//! while respecting every derived dependency. Tasks share a [`Sequence`]: once any task records a
//! failure, the remaining tasks are skipped.

mod graph;
mod status;

pub use graph::{Access, GraphStats, TaskGraph};
pub use status::Sequence;
