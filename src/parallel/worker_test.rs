//! Ring-level tests driving workers by hand.

use super::barrier::SyncPoint;
use super::executor::{Executor, Job, ThreadExecutor};
use super::queue::{SyncMarker, Task};
use super::supervision::SupervisionPolicy;
use super::worker::{Ring, Worker, WorkerSink, WorkerState};
use crate::error::SinkError;
use crate::metadata::Metadata;
use crate::sink::ThreadsafeSink;
use crate::sinks::{FnSink, VecSink};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Holds submitted jobs until the test runs them.
#[derive(Default)]
struct ManualExecutor {
  jobs: Mutex<Vec<Job>>,
}

impl ManualExecutor {
  fn submitted(&self) -> usize {
    self.jobs.lock().len()
  }

  fn run_next_on_thread(&self) -> thread::JoinHandle<()> {
    let job = self.jobs.lock().remove(0);
    thread::spawn(job)
  }
}

impl Executor for ManualExecutor {
  fn execute(&self, job: Job) {
    self.jobs.lock().push(job);
  }
}

fn ring_of<T: Send + 'static>(
  size: usize,
  queue_size: usize,
  sink: Arc<dyn ThreadsafeSink<T>>,
  executor: Arc<dyn Executor>,
  supervision: SupervisionPolicy,
) -> Arc<Ring<T>> {
  let workers = (0..size)
    .map(|i| Worker::new(i, "test", queue_size, WorkerSink::Shared(Arc::clone(&sink))))
    .collect();
  Arc::new(Ring::new(workers, executor, supervision))
}

fn item<T>(item: T) -> Task<T> {
  Task::Item {
    item,
    metadata: Metadata::new(),
  }
}

fn wait_until(what: &str, cond: impl Fn() -> bool) {
  let deadline = Instant::now() + Duration::from_secs(5);
  while !cond() {
    assert!(Instant::now() < deadline, "timed out waiting for {what}");
    thread::sleep(Duration::from_millis(1));
  }
}

fn commit_ring<T: Send + 'static>(ring: &Arc<Ring<T>>, generation: u64) -> (usize, bool) {
  let point = Arc::new(SyncPoint::new());
  let participants = ring.inject_markers(&point, &Metadata::new(), generation);
  (participants, point.arrive_and_wait(Duration::from_secs(5)))
}

#[test]
fn test_idle_worker_steals_queued_items() {
  let out = Arc::new(VecSink::new());
  let executor = Arc::new(ManualExecutor::default());
  let ring = ring_of(2, 8, out.clone(), executor.clone(), SupervisionPolicy::default());

  for n in 0..5 {
    assert!(ring.workers[0].queue.offer(item(n)).is_ok());
  }
  ring.launch(1);
  assert_eq!(executor.submitted(), 1);
  let b = executor.run_next_on_thread();

  wait_until("stolen items", || ring.workers[1].processed() == 5);
  let (participants, completed) = commit_ring(&ring, 0);
  b.join().unwrap();

  assert_eq!(participants, 1);
  assert!(completed);
  assert_eq!(ring.workers[0].processed(), 0);
  assert_eq!(ring.workers[1].processed(), 5);
  assert_eq!(ring.workers[1].stolen(), 5);
  assert_eq!(ring.workers[1].state(), WorkerState::Idle);
  assert_eq!(out.items(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_marker_is_never_stolen() {
  let out = Arc::new(VecSink::new());
  let executor = Arc::new(ManualExecutor::default());
  let ring = ring_of(2, 4, out.clone(), executor.clone(), SupervisionPolicy::default());

  let point = Arc::new(SyncPoint::new());
  ring.workers[0].queue.force(Task::Marker(SyncMarker {
    point: Arc::clone(&point),
    metadata: Metadata::new(),
    generation: 0,
  }));
  ring.workers[0].queue.force(item(42));

  ring.launch(1);
  let b = executor.run_next_on_thread();
  thread::sleep(Duration::from_millis(30));

  assert_eq!(ring.workers[0].queue.len(), 2);
  assert_eq!(ring.workers[1].processed(), 0);
  assert!(out.is_empty());

  ring.interrupt();
  b.join().unwrap();
  assert_eq!(ring.workers[1].state(), WorkerState::Idle);
}

#[test]
fn test_draining_worker_empties_peer_queues_before_arriving() {
  let out = Arc::new(VecSink::new());
  let executor = Arc::new(ManualExecutor::default());
  let ring = ring_of(2, 8, out.clone(), executor.clone(), SupervisionPolicy::default());

  // Worker 0 holds items but never runs; worker 1 only holds its marker.
  for n in 0..3 {
    assert!(ring.workers[0].queue.offer(item(n)).is_ok());
  }
  ring.launch(1);
  let point = Arc::new(SyncPoint::new());
  point.register();
  ring.workers[1].queue.force(Task::Marker(SyncMarker {
    point: Arc::clone(&point),
    metadata: Metadata::new(),
    generation: 7,
  }));
  executor.run_next_on_thread().join().unwrap();

  assert!(point.arrive_and_wait(Duration::from_secs(1)));
  assert_eq!(ring.workers[1].processed(), 3);
  assert!(ring.workers[0].queue.is_empty());
}

#[test]
fn test_dispatch_round_robin_then_overflow() {
  let out = Arc::new(VecSink::new());
  let executor = Arc::new(ManualExecutor::default());
  let ring = ring_of(3, 1, out.clone(), executor.clone(), SupervisionPolicy::default());
  let md = Metadata::new();

  for n in 0..3 {
    ring.dispatch(n, &md).unwrap();
  }
  assert_eq!(executor.submitted(), 3);
  assert!(ring.workers.iter().all(|w| w.queue.len() == 1));
  assert_eq!(ring.cursor(), 0);

  // Every queue is full: the producer blocks on the cursor worker until it
  // runs.
  let producer = {
    let ring = Arc::clone(&ring);
    thread::spawn(move || ring.dispatch(3, &Metadata::new()))
  };
  thread::sleep(Duration::from_millis(20));
  assert!(!producer.is_finished());

  let runners: Vec<_> = (0..3).map(|_| executor.run_next_on_thread()).collect();
  producer.join().unwrap().unwrap();
  assert_eq!(ring.cursor(), 1);

  let (participants, completed) = commit_ring(&ring, 0);
  for runner in runners {
    runner.join().unwrap();
  }
  assert_eq!(participants, 3);
  assert!(completed);
  let mut items = out.items();
  items.sort_unstable();
  assert_eq!(items, vec![0, 1, 2, 3]);
}

#[test]
fn test_panic_restarts_loop_and_is_recorded() {
  let out = Arc::new(VecSink::new());
  let sink = {
    let out = Arc::clone(&out);
    Arc::new(FnSink::new(move |n: u32, md: &Metadata| {
      assert!(n != 2, "cannot handle two");
      crate::sink::Sink::accept(&*out, n, md)
    }))
  };
  let ring = ring_of(
    1,
    4,
    sink,
    Arc::new(ThreadExecutor::new("panic-test")),
    SupervisionPolicy::default(),
  );
  let md = Metadata::new();
  for n in 1..=3 {
    ring.dispatch(n, &md).unwrap();
  }

  let (_, completed) = commit_ring(&ring, 0);
  assert!(completed);
  assert_eq!(out.items(), vec![1, 3]);
  assert_eq!(ring.workers[0].processed(), 3);
  match ring.collect_faults() {
    Some(SinkError::Panicked { component, message }) => {
      assert_eq!(component.name, "test#0");
      assert!(message.contains("cannot handle two"));
    }
    other => panic!("unexpected fault: {other:?}"),
  }
  assert!(ring.collect_faults().is_none());
}

#[test]
fn test_newer_fault_replaces_pending_one() {
  let sink = Arc::new(FnSink::new(|n: u32, _: &Metadata| {
    Err(SinkError::msg(format!("bad {n}")))
  }));
  let ring = ring_of(
    1,
    4,
    sink,
    Arc::new(ThreadExecutor::new("fault-test")),
    SupervisionPolicy::default(),
  );
  let md = Metadata::new();
  ring.dispatch(1, &md).unwrap();
  ring.dispatch(2, &md).unwrap();

  let (_, completed) = commit_ring(&ring, 0);
  assert!(completed);
  let fault = ring.collect_faults().expect("fault");
  assert_eq!(fault.to_string(), "bad 2");
}
