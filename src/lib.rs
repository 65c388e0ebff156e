//! # sinkweave
//!
//! Chained sinks and a work-stealing parallel commit engine.
//!
//! Data flows one way: producer → chaining sinks ([`sinks`]) → aggregating
//! sinks ([`aggregate`]) → the parallel engine ([`parallel`]) → N instances
//! of a terminal sink. Commits follow the same path; the parallel engine
//! holds `commit` until every active worker finished its in-flight items and
//! ran its partial commit.
//!
//! ```rust
//! use sinkweave::metadata::Metadata;
//! use sinkweave::parallel::{ParallelConfig, ParallelSink, ThreadExecutor};
//! use sinkweave::sink::Sink;
//! use sinkweave::sinks::{SinkExt, VecSink};
//! use std::sync::Arc;
//!
//! let batches = Arc::new(VecSink::<Vec<u32>>::new());
//! let engine = ParallelSink::threadsafe(
//!   Arc::clone(&batches),
//!   ParallelConfig::default().with_parallelism(2),
//!   Arc::new(ThreadExecutor::default()),
//! )
//! .unwrap();
//! let pipeline = engine
//!   .queue_batched::<u32>(4)
//!   .unwrap()
//!   .filtered(|n: &u32| n % 3 != 0);
//!
//! let md = Metadata::new();
//! for n in 0..20 {
//!   pipeline.accept(n, &md).unwrap();
//! }
//! pipeline.commit(&md).unwrap();
//!
//! let total: usize = batches.items().iter().map(Vec::len).sum();
//! assert_eq!(total, 13);
//! ```

#![deny(missing_docs)]

/// Aggregating sinks grouping items into chunks.
pub mod aggregate;
/// Error types.
pub mod error;
/// Opaque per-call context.
pub mod metadata;
/// The work-stealing parallel engine.
pub mod parallel;
/// The sink contract and capability markers.
pub mod sink;
/// Chaining and terminal sinks.
pub mod sinks;

pub use error::{ConfigError, SinkError};
pub use metadata::Metadata;
pub use parallel::{ParallelConfig, ParallelSink};
pub use sink::{CloneableSink, Sink, ThreadsafeSink};
