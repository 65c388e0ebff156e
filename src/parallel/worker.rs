//! The worker ring: dispatch, run loops, stealing and synchronization.
//!
//! Workers live in a fixed arena indexed by ring position; "next" is
//! `(index + 1) % len`. The dispatch cursor is an index into the arena.

use super::barrier::SyncPoint;
use super::executor::Executor;
use super::queue::{Interrupted, SyncMarker, Task, WorkQueue};
use super::supervision::SupervisionPolicy;
use crate::error::{ComponentInfo, SinkError};
use crate::metadata::Metadata;
use crate::sink::{CloneableSink, ThreadsafeSink};
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, trace, warn};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const DRAINING: u8 = 2;

/// Lifecycle of a worker within one commit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
  /// No run loop; relaunched by the next dispatch to this worker.
  Idle,
  /// A run loop is processing items.
  Running,
  /// The loop dequeued its commit marker and is draining the ring.
  Draining,
}

impl WorkerState {
  fn from_raw(raw: u8) -> Self {
    match raw {
      RUNNING => WorkerState::Running,
      DRAINING => WorkerState::Draining,
      _ => WorkerState::Idle,
    }
  }
}

/// The sink a worker executes items on.
pub(crate) enum WorkerSink<T> {
  /// One instance shared by the whole ring.
  Shared(Arc<dyn ThreadsafeSink<T>>),
  /// This worker's private clone.
  Owned(Mutex<Box<dyn CloneableSink<T>>>),
}

impl<T> WorkerSink<T> {
  fn accept(&self, item: T, metadata: &Metadata) -> Result<(), SinkError> {
    match self {
      WorkerSink::Shared(sink) => sink.accept(item, metadata),
      WorkerSink::Owned(sink) => sink.lock().accept(item, metadata),
    }
  }

  fn partial_commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    match self {
      WorkerSink::Shared(_) => Ok(()),
      WorkerSink::Owned(sink) => sink.lock().partial_commit(metadata),
    }
  }
}

pub(crate) struct Worker<T> {
  index: usize,
  component: ComponentInfo,
  pub(crate) queue: WorkQueue<Task<T>>,
  sink: WorkerSink<T>,
  state: AtomicU8,
  processed: AtomicU64,
  stolen: AtomicU64,
  restarts: AtomicU32,
  fault: Mutex<Option<SinkError>>,
  /// Marker dequeued by a loop that has not arrived yet; a restarted loop
  /// resumes synchronization from here.
  parked: Mutex<Option<SyncMarker>>,
}

impl<T> Worker<T> {
  pub(crate) fn new(index: usize, name: &str, queue_size: usize, sink: WorkerSink<T>) -> Self {
    Self {
      index,
      component: ComponentInfo::new(format!("{name}#{index}"), "ParallelSink"),
      queue: WorkQueue::new(queue_size),
      sink,
      state: AtomicU8::new(IDLE),
      processed: AtomicU64::new(0),
      stolen: AtomicU64::new(0),
      restarts: AtomicU32::new(0),
      fault: Mutex::new(None),
      parked: Mutex::new(None),
    }
  }

  pub(crate) fn state(&self) -> WorkerState {
    WorkerState::from_raw(self.state.load(Ordering::Acquire))
  }

  pub(crate) fn processed(&self) -> u64 {
    self.processed.load(Ordering::Acquire)
  }

  pub(crate) fn stolen(&self) -> u64 {
    self.stolen.load(Ordering::Acquire)
  }

  /// Stores a fault for the next commit. A fault already pending is logged
  /// and replaced.
  fn record_fault(&self, fault: SinkError) {
    let mut slot = self.fault.lock();
    if let Some(previous) = slot.replace(fault) {
      warn!(
        worker = self.index,
        error = %previous,
        "worker fault replaced by a newer one before commit"
      );
    }
  }

  pub(crate) fn take_fault(&self) -> Option<SinkError> {
    self.fault.lock().take()
  }

  fn execute(&self, item: T, metadata: &Metadata) {
    self.processed.fetch_add(1, Ordering::AcqRel);
    if let Err(e) = self.sink.accept(item, metadata) {
      self.record_fault(e);
    }
  }

  /// Like `execute`, with a panic recorded as a fault instead of unwinding.
  fn execute_guarded(&self, item: T, metadata: &Metadata) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.execute(item, metadata))) {
      self.record_fault(self.panicked(payload.as_ref()));
    }
  }

  fn partial_commit(&self, metadata: &Metadata) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| self.sink.partial_commit(metadata)));
    match result {
      Ok(Ok(())) => {}
      Ok(Err(e)) => self.record_fault(e),
      Err(payload) => self.record_fault(self.panicked(payload.as_ref())),
    }
  }

  fn panicked(&self, payload: &(dyn Any + Send)) -> SinkError {
    SinkError::Panicked {
      component: self.component.clone(),
      message: panic_message(payload),
    }
  }
}

enum LoopExit {
  Synchronized,
  Interrupted,
}

pub(crate) struct Ring<T> {
  pub(crate) workers: Vec<Worker<T>>,
  cursor: AtomicUsize,
  executor: Arc<dyn Executor>,
  supervision: SupervisionPolicy,
}

impl<T> Ring<T> {
  /// Permanently stops every run loop at its next blocking wait.
  pub(crate) fn close(&self) {
    for worker in &self.workers {
      worker.queue.close();
    }
  }
}

impl<T: Send + 'static> Ring<T> {
  pub(crate) fn new(
    workers: Vec<Worker<T>>,
    executor: Arc<dyn Executor>,
    supervision: SupervisionPolicy,
  ) -> Self {
    Self {
      workers,
      cursor: AtomicUsize::new(0),
      executor,
      supervision,
    }
  }

  fn next(&self, index: usize) -> usize {
    (index + 1) % self.workers.len()
  }

  pub(crate) fn cursor(&self) -> usize {
    self.cursor.load(Ordering::Acquire)
  }

  /// Starts a run loop for `index` unless one is already running.
  pub(crate) fn launch(self: &Arc<Self>, index: usize) {
    let worker = &self.workers[index];
    if worker
      .state
      .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
    {
      trace!(worker = index, "launching run loop");
      self.submit(index);
    }
  }

  fn submit(self: &Arc<Self>, index: usize) {
    let ring = Arc::clone(self);
    self.executor.execute(Box::new(move || ring.supervise(index)));
  }

  /// Round-robin dispatch with fallback to the following workers, then
  /// backpressure on the worker at the cursor.
  ///
  /// Safe to call from several threads. The cursor only moves from the value
  /// a call started with, so racing callers may share a start worker but it
  /// always names a ring member.
  pub(crate) fn dispatch(self: &Arc<Self>, item: T, metadata: &Metadata) -> Result<(), SinkError> {
    let start = self.cursor();
    let mut task = Task::Item {
      item,
      metadata: metadata.clone(),
    };
    let mut index = start;
    loop {
      self.launch(index);
      match self.workers[index].queue.offer(task) {
        Ok(()) => {
          self.launch(index);
          self.advance(start, index);
          return Ok(());
        }
        Err(rejected) => task = rejected,
      }
      index = self.next(index);
      if index == start {
        break;
      }
    }

    trace!(worker = start, "all queues full, blocking");
    self.workers[start]
      .queue
      .put(task)
      .map_err(|Interrupted| SinkError::Interrupted)?;
    self.launch(start);
    self.advance(start, start);
    Ok(())
  }

  fn advance(&self, start: usize, accepted_by: usize) {
    let _ = self.cursor.compare_exchange(
      start,
      self.next(accepted_by),
      Ordering::AcqRel,
      Ordering::Acquire,
    );
  }

  /// Registers every non-idle worker on `point` and injects its marker.
  /// Returns the number of workers registered.
  /// A worker that went idle after being counted is relaunched to consume
  /// its marker.
  pub(crate) fn inject_markers(
    self: &Arc<Self>,
    point: &Arc<SyncPoint>,
    metadata: &Metadata,
    generation: u64,
  ) -> usize {
    let start = self.cursor();
    let mut participants = Vec::with_capacity(self.workers.len());
    let mut index = start;
    loop {
      if self.workers[index].state() != WorkerState::Idle {
        point.register();
        participants.push(index);
      }
      index = self.next(index);
      if index == start {
        break;
      }
    }
    for &index in &participants {
      self.workers[index].queue.force(Task::Marker(SyncMarker {
        point: Arc::clone(point),
        metadata: metadata.clone(),
        generation,
      }));
      self.launch(index);
    }
    participants.len()
  }

  /// Collects pending faults ring-wide. The first one found is returned,
  /// the others are logged.
  pub(crate) fn collect_faults(&self) -> Option<SinkError> {
    let start = self.cursor();
    let mut first = None;
    let mut index = start;
    loop {
      if let Some(fault) = self.workers[index].take_fault() {
        if first.is_none() {
          first = Some(fault);
        } else {
          error!(worker = index, error = %fault, "additional worker fault in commit cycle");
        }
      }
      index = self.next(index);
      if index == start {
        break;
      }
    }
    first
  }

  pub(crate) fn interrupt(&self) {
    for worker in &self.workers {
      worker.queue.interrupt();
    }
  }


  fn supervise(self: Arc<Self>, index: usize) {
    let worker = &self.workers[index];
    match panic::catch_unwind(AssertUnwindSafe(|| self.run(index))) {
      Ok(LoopExit::Synchronized) => {}
      Ok(LoopExit::Interrupted) => {
        debug!(worker = index, "worker interrupted, run loop stopped");
        worker.state.store(IDLE, Ordering::Release);
      }
      Err(payload) => {
        let fault = worker.panicked(payload.as_ref());
        error!(worker = index, error = %fault, "worker run loop panicked");
        worker.record_fault(fault);
        let attempt = worker.restarts.fetch_add(1, Ordering::AcqRel) + 1;
        if self.supervision.allows_restart(attempt) {
          if !self.supervision.restart_backoff.is_zero() {
            thread::sleep(self.supervision.restart_backoff);
          }
          debug!(worker = index, attempt, "restarting run loop");
          self.submit(index);
        } else {
          error!(worker = index, attempt, "worker not restarted");
          self.abandon(index);
        }
      }
    }
  }

  /// Gives up on a worker's run loop. A marker it held is arrived on, and
  /// whatever is still queued, markers included, is handled here without
  /// supervision so no commit waits on a worker that is gone.
  fn abandon(self: &Arc<Self>, index: usize) {
    let worker = &self.workers[index];
    let parked = worker.parked.lock().take();
    if let Some(marker) = parked {
      worker.partial_commit(&marker.metadata);
      marker.point.arrive();
    }
    worker.restarts.store(0, Ordering::Release);
    loop {
      while let Some(task) = worker.queue.poll() {
        match task {
          Task::Item { item, metadata } => worker.execute_guarded(item, &metadata),
          Task::Marker(marker) => {
            worker.partial_commit(&marker.metadata);
            marker.point.arrive();
          }
        }
      }
      if worker
        .queue
        .retire_if_empty(|| worker.state.store(IDLE, Ordering::Release))
      {
        break;
      }
    }
  }

  fn run(self: &Arc<Self>, index: usize) -> LoopExit {
    let worker = &self.workers[index];
    let resumed = worker.parked.lock().clone();
    if let Some(marker) = resumed {
      if self.synchronize(index, marker) {
        return LoopExit::Synchronized;
      }
    }
    loop {
      let task = match worker.queue.poll() {
        Some(task) => task,
        None => {
          if self.steal_one(index) {
            continue;
          }
          match worker.queue.take() {
            Ok(task) => task,
            Err(Interrupted) => return LoopExit::Interrupted,
          }
        }
      };
      match task {
        Task::Item { item, metadata } => worker.execute(item, &metadata),
        Task::Marker(marker) => {
          *worker.parked.lock() = Some(marker.clone());
          if self.synchronize(index, marker) {
            return LoopExit::Synchronized;
          }
        }
      }
    }
  }

  /// One ring walk starting after `thief`, executing the first stolen item.
  fn steal_one(&self, thief: usize) -> bool {
    let mut donor = self.next(thief);
    while donor != thief {
      if let Some((item, metadata)) = self.workers[donor].queue.steal() {
        trace!(worker = thief, donor, "stole item");
        let worker = &self.workers[thief];
        worker.stolen.fetch_add(1, Ordering::AcqRel);
        worker.execute(item, &metadata);
        return true;
      }
      donor = self.next(donor);
    }
    false
  }

  /// Handles a dequeued marker. Returns true when the worker went idle;
  /// false when work queued behind the marker (left by a timed-out cycle or
  /// accepted since) keeps the loop running.
  fn synchronize(&self, index: usize, marker: SyncMarker) -> bool {
    let worker = &self.workers[index];
    worker.state.store(DRAINING, Ordering::Release);
    while self.steal_one(index) {}
    worker.partial_commit(&marker.metadata);
    debug!(worker = index, generation = marker.generation, "worker synchronized");

    worker.parked.lock().take();
    worker.restarts.store(0, Ordering::Release);
    let retired = worker
      .queue
      .retire_if_empty(|| worker.state.store(IDLE, Ordering::Release));
    if !retired {
      worker.state.store(RUNNING, Ordering::Release);
    }
    marker.point.arrive();
    retired
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
