//! # Parallelizing Engine
//!
//! [`ParallelSink`] fans one logical consumer out to a fixed ring of N
//! workers. Each worker owns a bounded queue and runs lazily on an external
//! [`Executor`]:
//!
//! - **Dispatch**: `accept` offers the item to the worker at the round-robin
//!   cursor, then to the following workers; if every queue is full it blocks
//!   on the cursor worker's queue (backpressure).
//! - **Stealing**: a worker whose own queue is empty takes items from the
//!   front of its peers' queues, never past a commit marker.
//! - **Commit**: every running worker gets a marker; on dequeuing it, the
//!   worker drains whatever is still stealable, runs its partial commit and
//!   arrives at the cycle's barrier. Then faults are collected (first wins,
//!   others are logged), the downstream sink commits, and the first fault is
//!   returned.
//!
//! ```rust
//! use sinkweave::metadata::Metadata;
//! use sinkweave::parallel::{ParallelConfig, ParallelSink, ThreadExecutor};
//! use sinkweave::sink::Sink;
//! use sinkweave::sinks::VecSink;
//! use std::sync::Arc;
//!
//! let out = Arc::new(VecSink::new());
//! let engine = ParallelSink::threadsafe(
//!   Arc::clone(&out),
//!   ParallelConfig::default().with_parallelism(3).with_queue_size(2),
//!   Arc::new(ThreadExecutor::default()),
//! )
//! .unwrap();
//!
//! let md = Metadata::new();
//! for i in 1..=10 {
//!   engine.accept(i, &md).unwrap();
//! }
//! engine.commit(&md).unwrap();
//!
//! assert_eq!(out.len(), 10);
//! assert_eq!(engine.stats().processed(), 10);
//! ```

mod barrier;
mod config;
mod executor;
mod queue;
mod supervision;
mod worker;

#[cfg(test)]
mod worker_test;

pub use config::ParallelConfig;
pub use executor::{Executor, Job, ThreadExecutor, TokioExecutor};
pub use supervision::{FailureAction, SupervisionPolicy};
pub use worker::WorkerState;

use crate::error::{ConfigError, SinkError};
use crate::metadata::Metadata;
use crate::sink::{CloneableSink, Sink, ThreadsafeSink};
use barrier::SyncPoint;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};
use worker::{Ring, Worker, WorkerSink};

/// The terminal sink, resolved once at construction.
enum Target<T> {
  Shared(Arc<dyn ThreadsafeSink<T>>),
  Prototype(Mutex<Box<dyn CloneableSink<T>>>),
}

impl<T> Target<T> {
  fn commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    match self {
      Target::Shared(sink) => sink.commit(metadata),
      Target::Prototype(sink) => sink.lock().commit(metadata),
    }
  }
}

/// Counters of one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
  /// Ring position.
  pub index: usize,
  /// Items this worker executed, stolen ones included.
  pub processed: u64,
  /// Items this worker took from a peer's queue.
  pub stolen: u64,
  /// Tasks waiting in this worker's queue.
  pub queued: usize,
  /// Current lifecycle state.
  pub state: WorkerState,
}

/// Snapshot of the engine counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStats {
  /// Completed commit cycles.
  pub generation: u64,
  /// Workers waited on by the last commit.
  pub last_participants: usize,
  /// Per-worker counters, in ring order.
  pub workers: Vec<WorkerStats>,
}

impl EngineStats {
  /// Items executed across the ring.
  pub fn processed(&self) -> u64 {
    self.workers.iter().map(|w| w.processed).sum()
  }

  /// Items obtained by stealing across the ring.
  pub fn stolen(&self) -> u64 {
    self.workers.iter().map(|w| w.stolen).sum()
  }
}

/// A sink that executes its terminal sink on a ring of parallel workers.
///
/// `accept` may be called from several threads. `commit` observes every
/// item whose `accept` returned before it started.
pub struct ParallelSink<T> {
  ring: Arc<Ring<T>>,
  target: Target<T>,
  config: ParallelConfig,
  generation: AtomicU64,
  last_participants: AtomicUsize,
}

impl<T: Send + 'static> ParallelSink<T> {
  /// Shares one thread-safe `target` instance between all workers.
  pub fn threadsafe<S>(
    target: Arc<S>,
    config: ParallelConfig,
    executor: Arc<dyn Executor>,
  ) -> Result<Self, ConfigError>
  where
    S: ThreadsafeSink<T> + 'static,
  {
    config.validate()?;
    let shared: Arc<dyn ThreadsafeSink<T>> = target;
    let workers = (0..config.parallelism)
      .map(|index| {
        Worker::new(
          index,
          &config.name,
          config.queue_size,
          WorkerSink::Shared(Arc::clone(&shared)),
        )
      })
      .collect();
    Ok(Self::assemble(workers, Target::Shared(shared), config, executor))
  }

  /// Gives every worker its own clone of `target`. `target` itself only
  /// receives the global `commit`.
  pub fn cloneable<S>(
    target: S,
    config: ParallelConfig,
    executor: Arc<dyn Executor>,
  ) -> Result<Self, ConfigError>
  where
    S: CloneableSink<T> + 'static,
  {
    config.validate()?;
    let mut workers = Vec::with_capacity(config.parallelism);
    for slot in 0..config.parallelism {
      let clone = target
        .create_clone()
        .map_err(|e| ConfigError::CloneFailed {
          slot,
          source: Box::new(e),
        })?;
      let owned: Box<dyn CloneableSink<T>> = Box::new(clone);
      workers.push(Worker::new(
        slot,
        &config.name,
        config.queue_size,
        WorkerSink::Owned(Mutex::new(owned)),
      ));
    }
    let prototype: Box<dyn CloneableSink<T>> = Box::new(target);
    Ok(Self::assemble(
      workers,
      Target::Prototype(Mutex::new(prototype)),
      config,
      executor,
    ))
  }

  fn assemble(
    workers: Vec<Worker<T>>,
    target: Target<T>,
    config: ParallelConfig,
    executor: Arc<dyn Executor>,
  ) -> Self {
    debug!(
      name = %config.name,
      parallelism = config.parallelism,
      queue_size = config.queue_size,
      "parallel sink created"
    );
    Self {
      ring: Arc::new(Ring::new(workers, executor, config.supervision.clone())),
      target,
      config,
      generation: AtomicU64::new(0),
      last_participants: AtomicUsize::new(0),
    }
  }

  /// Configuration the engine was built with.
  pub fn config(&self) -> &ParallelConfig {
    &self.config
  }

  /// Snapshot of the ring counters.
  pub fn stats(&self) -> EngineStats {
    EngineStats {
      generation: self.generation.load(Ordering::Acquire),
      last_participants: self.last_participants.load(Ordering::Acquire),
      workers: self
        .ring
        .workers
        .iter()
        .enumerate()
        .map(|(index, w)| WorkerStats {
          index,
          processed: w.processed(),
          stolen: w.stolen(),
          queued: w.queue.len(),
          state: w.state(),
        })
        .collect(),
    }
  }

  /// Cooperative cancellation of the waits in progress: workers blocked on
  /// an empty queue leave their run loop, and a producer blocked on
  /// backpressure gets [`SinkError::Interrupted`]. Calls made afterwards are
  /// unaffected; idle workers are relaunched by later dispatches.
  pub fn interrupt(&self) {
    self.ring.interrupt();
  }
}

impl<T: Send + 'static> Sink<T> for ParallelSink<T> {
  fn accept(&self, item: T, metadata: &Metadata) -> Result<(), SinkError> {
    self.ring.dispatch(item, metadata)
  }

  fn commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    let generation = self.generation.load(Ordering::Acquire);
    let point = Arc::new(SyncPoint::new());
    let participants = self.ring.inject_markers(&point, metadata, generation);
    self.last_participants.store(participants, Ordering::Release);

    if !point.arrive_and_wait(self.config.commit_timeout) {
      warn!(
        name = %self.config.name,
        generation,
        parties = point.parties(),
        outstanding = point.outstanding(),
        timeout = ?self.config.commit_timeout,
        "commit barrier timed out"
      );
    }
    self.generation.fetch_add(1, Ordering::AcqRel);

    let fault = self.ring.collect_faults();
    let downstream = self.target.commit(metadata);
    debug!(name = %self.config.name, generation, participants, "commit cycle finished");
    match (fault, downstream) {
      (Some(fault), Err(e)) => {
        error!(error = %e, "downstream commit failed while a worker fault is pending");
        Err(fault)
      }
      (Some(fault), Ok(())) => Err(fault),
      (None, result) => result,
    }
  }
}

impl<T> Drop for ParallelSink<T> {
  fn drop(&mut self) {
    self.ring.close();
  }
}
