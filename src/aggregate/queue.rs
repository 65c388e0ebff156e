use crate::error::{ConfigError, SinkError};
use crate::metadata::Metadata;
use crate::sink::{CloneableSink, Sink, ThreadsafeSink};
use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;
use std::thread;
use std::time::Duration;
use tracing::trace;

const DEFAULT_BACKOFF: Duration = Duration::from_micros(100);

/// Batches items through a bounded lock-free queue.
///
/// The queue holds exactly one chunk. A producer hitting a full queue either
/// wins the flush lock and forwards the chunk itself, or sleeps for the
/// backoff period and retries. `commit` forwards the remainder using the most
/// recently accepted metadata, then commits the target.
pub struct QueueAggregator<T, S> {
  queue: ArrayQueue<T>,
  target: Mutex<S>,
  last_metadata: Mutex<Option<Metadata>>,
  backoff: Duration,
}

impl<T, S> QueueAggregator<T, S>
where
  S: Sink<Vec<T>>,
{
  /// Creates an aggregator forwarding chunks of `chunk_size` to `target`.
  pub fn new(target: S, chunk_size: usize) -> Result<Self, ConfigError> {
    if chunk_size == 0 {
      return Err(ConfigError::ZeroChunkSize);
    }
    Ok(Self {
      queue: ArrayQueue::new(chunk_size),
      target: Mutex::new(target),
      last_metadata: Mutex::new(None),
      backoff: DEFAULT_BACKOFF,
    })
  }

  /// Sets how long a producer sleeps when another thread holds the flush lock.
  #[must_use]
  pub fn with_backoff(mut self, backoff: Duration) -> Self {
    self.backoff = backoff;
    self
  }

  /// Chunk size.
  pub fn chunk_size(&self) -> usize {
    self.queue.capacity()
  }

  /// Number of items waiting for the next chunk.
  pub fn pending(&self) -> usize {
    self.queue.len()
  }

  /// Unwraps the downstream sink. Pending items are dropped.
  pub fn into_target(self) -> S {
    self.target.into_inner()
  }

  fn forward_chunk(&self, target: &S, metadata: &Metadata) -> Result<(), SinkError> {
    let mut chunk = Vec::with_capacity(self.queue.capacity());
    while chunk.len() < self.queue.capacity() {
      match self.queue.pop() {
        Some(item) => chunk.push(item),
        None => break,
      }
    }
    if chunk.is_empty() {
      return Ok(());
    }
    trace!(size = chunk.len(), "forwarding chunk");
    target.accept(chunk, metadata)
  }

  fn flush_remaining(&self, target: &S, fallback: &Metadata) -> Result<(), SinkError> {
    let last = self.last_metadata.lock().clone();
    let metadata = last.as_ref().unwrap_or(fallback);
    while !self.queue.is_empty() {
      self.forward_chunk(target, metadata)?;
    }
    Ok(())
  }
}

impl<T, S> Sink<T> for QueueAggregator<T, S>
where
  T: Send,
  S: Sink<Vec<T>>,
{
  fn accept(&self, item: T, metadata: &Metadata) -> Result<(), SinkError> {
    *self.last_metadata.lock() = Some(metadata.clone());
    let mut item = item;
    loop {
      match self.queue.push(item) {
        Ok(()) => return Ok(()),
        Err(rejected) => {
          item = rejected;
          match self.target.try_lock() {
            Some(target) => self.forward_chunk(&target, metadata)?,
            None => thread::sleep(self.backoff),
          }
        }
      }
    }
  }

  fn commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    let target = self.target.lock();
    self.flush_remaining(&target, metadata)?;
    target.commit(metadata)
  }
}

impl<T, S> CloneableSink<T> for QueueAggregator<T, S>
where
  T: Send,
  S: CloneableSink<Vec<T>>,
{
  fn create_clone(&self) -> Result<Self, SinkError> {
    let target = self.target.lock().create_clone()?;
    Ok(Self {
      queue: ArrayQueue::new(self.queue.capacity()),
      target: Mutex::new(target),
      last_metadata: Mutex::new(None),
      backoff: self.backoff,
    })
  }

  fn partial_commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    let target = self.target.lock();
    self.flush_remaining(&target, metadata)?;
    target.partial_commit(metadata)
  }
}

impl<T, S> ThreadsafeSink<T> for QueueAggregator<T, S>
where
  T: Send,
  S: Sink<Vec<T>>,
{
}
