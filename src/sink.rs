//! # Sink Contract
//!
//! A [`Sink`] is the unit of work of a processing chain: it accepts items and
//! commits batches. Chaining sinks wrap a downstream sink (their *target*),
//! aggregating sinks buffer items into chunks, and the parallel engine fans a
//! single terminal sink out to N workers.
//!
//! Two capability markers decide how a terminal sink can be used by the
//! parallel engine:
//!
//! - [`ThreadsafeSink`]: one instance may be shared by every worker.
//! - [`CloneableSink`]: each worker gets its own independent clone and a
//!   per-cycle [`partial_commit`](CloneableSink::partial_commit) hook.
//!
//! Implementations may reorder or delay `accept` calls but must never drop an
//! item unless they filter on purpose, and must eventually honor every
//! `commit`.
//!
//! ## Example
//!
//! ```rust
//! use sinkweave::error::SinkError;
//! use sinkweave::metadata::Metadata;
//! use sinkweave::sink::{Sink, ThreadsafeSink};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! #[derive(Default)]
//! struct Counter(AtomicUsize);
//!
//! impl Sink<u32> for Counter {
//!   fn accept(&self, _item: u32, _metadata: &Metadata) -> Result<(), SinkError> {
//!     self.0.fetch_add(1, Ordering::Relaxed);
//!     Ok(())
//!   }
//!
//!   fn commit(&self, _metadata: &Metadata) -> Result<(), SinkError> {
//!     Ok(())
//!   }
//! }
//!
//! impl ThreadsafeSink<u32> for Counter {}
//! ```

use crate::error::SinkError;
use crate::metadata::Metadata;
use std::sync::Arc;

/// A consumer stage in a processing chain.
pub trait Sink<T>: Send {
  /// Hands one item to the sink.
  fn accept(&self, item: T, metadata: &Metadata) -> Result<(), SinkError>;

  /// Commits everything accepted so far.
  fn commit(&self, metadata: &Metadata) -> Result<(), SinkError>;
}

/// A sink that can produce functionally independent copies of itself.
///
/// The parallel engine creates one clone per worker at construction time and
/// calls [`partial_commit`](Self::partial_commit) once per worker per commit
/// cycle, before the global commit reaches the original instance.
pub trait CloneableSink<T>: Sink<T> {
  /// Creates an instance sharing no mutable state with `self`.
  fn create_clone(&self) -> Result<Self, SinkError>
  where
    Self: Sized;

  /// Per-worker finalization for one commit cycle.
  fn partial_commit(&self, _metadata: &Metadata) -> Result<(), SinkError> {
    Ok(())
  }
}

/// Marker: a single instance may be called concurrently from many workers
/// without external locking.
pub trait ThreadsafeSink<T>: Sink<T> + Sync {}

impl<T, S> Sink<T> for Box<S>
where
  S: Sink<T> + ?Sized,
{
  fn accept(&self, item: T, metadata: &Metadata) -> Result<(), SinkError> {
    (**self).accept(item, metadata)
  }

  fn commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    (**self).commit(metadata)
  }
}

impl<T, S> CloneableSink<T> for Box<S>
where
  S: CloneableSink<T>,
{
  fn create_clone(&self) -> Result<Self, SinkError> {
    Ok(Box::new((**self).create_clone()?))
  }

  fn partial_commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    (**self).partial_commit(metadata)
  }
}

impl<T, S> ThreadsafeSink<T> for Box<S> where S: ThreadsafeSink<T> + ?Sized {}

impl<T, S> Sink<T> for Arc<S>
where
  S: Sink<T> + Sync + ?Sized,
{
  fn accept(&self, item: T, metadata: &Metadata) -> Result<(), SinkError> {
    (**self).accept(item, metadata)
  }

  fn commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    (**self).commit(metadata)
  }
}

impl<T, S> ThreadsafeSink<T> for Arc<S> where S: ThreadsafeSink<T> + ?Sized {}

impl<'a, T, S> Sink<T> for &'a S
where
  S: Sink<T> + Sync + ?Sized,
{
  fn accept(&self, item: T, metadata: &Metadata) -> Result<(), SinkError> {
    (**self).accept(item, metadata)
  }

  fn commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    (**self).commit(metadata)
  }
}

impl<'a, T, S> ThreadsafeSink<T> for &'a S where S: ThreadsafeSink<T> + ?Sized {}
