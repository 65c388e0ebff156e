//! Where worker run loops execute.
//!
//! The engine only needs "run this eventually". Worker loops block on their
//! queues, so executors must run jobs on threads that may block.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tokio::runtime::{Handle, TryCurrentError};
use tracing::error;

/// A unit of work submitted to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Accepts jobs for asynchronous execution.
pub trait Executor: Send + Sync {
  /// Runs `job` at some point, on some thread other than the caller's.
  fn execute(&self, job: Job);
}

impl<F> Executor for F
where
  F: Fn(Job) + Send + Sync,
{
  fn execute(&self, job: Job) {
    self(job)
  }
}

/// Spawns one named OS thread per job.
pub struct ThreadExecutor {
  prefix: String,
  spawned: AtomicUsize,
}

impl ThreadExecutor {
  /// Threads are named `{prefix}-{n}`.
  pub fn new(prefix: impl Into<String>) -> Self {
    Self {
      prefix: prefix.into(),
      spawned: AtomicUsize::new(0),
    }
  }

  /// Number of threads spawned so far.
  pub fn spawned(&self) -> usize {
    self.spawned.load(Ordering::Relaxed)
  }
}

impl Default for ThreadExecutor {
  fn default() -> Self {
    Self::new("sink-worker")
  }
}

impl fmt::Debug for ThreadExecutor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ThreadExecutor")
      .field("prefix", &self.prefix)
      .field("spawned", &self.spawned())
      .finish()
  }
}

impl Executor for ThreadExecutor {
  fn execute(&self, job: Job) {
    let n = self.spawned.fetch_add(1, Ordering::Relaxed);
    let name = format!("{}-{}", self.prefix, n);
    if let Err(e) = thread::Builder::new().name(name.clone()).spawn(job) {
      error!(thread = %name, error = %e, "failed to spawn worker thread");
    }
  }
}

/// Runs jobs on a tokio runtime's blocking pool.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
  handle: Handle,
}

impl TokioExecutor {
  /// Uses the given runtime.
  pub fn new(handle: Handle) -> Self {
    Self { handle }
  }

  /// Uses the runtime the caller is running on.
  pub fn current() -> Result<Self, TryCurrentError> {
    Handle::try_current().map(Self::new)
  }
}

impl Executor for TokioExecutor {
  fn execute(&self, job: Job) {
    // The join handle is dropped; the blocking task keeps running detached.
    drop(self.handle.spawn_blocking(job));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::mpsc;
  use std::time::Duration;

  #[test]
  fn test_thread_executor_names_threads() {
    let executor = ThreadExecutor::new("probe");
    let (tx, rx) = mpsc::channel();
    executor.execute(Box::new(move || {
      tx.send(thread::current().name().map(str::to_string)).unwrap();
    }));
    let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(name.as_deref(), Some("probe-0"));
    assert_eq!(executor.spawned(), 1);
  }

  #[test]
  fn test_closure_is_an_executor() {
    let executor = |job: Job| job();
    let (tx, rx) = mpsc::channel();
    executor.execute(Box::new(move || tx.send(7).unwrap()));
    assert_eq!(rx.try_recv(), Ok(7));
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn test_tokio_executor_runs_blocking_job() {
    let executor = TokioExecutor::current().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();
    executor.execute(Box::new(move || {
      thread::sleep(Duration::from_millis(5));
      let _ = tx.send("done");
    }));
    assert_eq!(rx.await, Ok("done"));
  }

  #[test]
  fn test_current_outside_runtime_fails() {
    assert!(TokioExecutor::current().is_err());
  }
}
