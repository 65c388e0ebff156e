use crate::error::{ConfigError, SinkError};
use crate::metadata::Metadata;
use crate::sink::{CloneableSink, Sink, ThreadsafeSink};
use parking_lot::Mutex;
use std::mem;

/// Batches items into a list guarded by a plain mutex.
///
/// The producer that fills a chunk swaps in a fresh list while holding the
/// lock and forwards the full one after releasing it, so downstream I/O never
/// runs under the lock. Shared use therefore needs a thread-safe target.
pub struct ListAggregator<T, S> {
  chunk_size: usize,
  list: Mutex<Vec<T>>,
  target: S,
}

impl<T, S> ListAggregator<T, S>
where
  S: Sink<Vec<T>>,
{
  /// Creates an aggregator forwarding chunks of `chunk_size` to `target`.
  pub fn new(target: S, chunk_size: usize) -> Result<Self, ConfigError> {
    if chunk_size == 0 {
      return Err(ConfigError::ZeroChunkSize);
    }
    Ok(Self {
      chunk_size,
      list: Mutex::new(Vec::with_capacity(chunk_size)),
      target,
    })
  }

  /// Chunk size.
  pub fn chunk_size(&self) -> usize {
    self.chunk_size
  }

  /// Number of items waiting for the next chunk.
  pub fn pending(&self) -> usize {
    self.list.lock().len()
  }

  /// The downstream sink.
  pub fn target(&self) -> &S {
    &self.target
  }

  /// Unwraps the downstream sink. Pending items are dropped.
  pub fn into_target(self) -> S {
    self.target
  }

  fn take_remaining(&self) -> Vec<T> {
    mem::take(&mut *self.list.lock())
  }
}

impl<T, S> Sink<T> for ListAggregator<T, S>
where
  T: Send,
  S: Sink<Vec<T>>,
{
  fn accept(&self, item: T, metadata: &Metadata) -> Result<(), SinkError> {
    let full = {
      let mut list = self.list.lock();
      list.push(item);
      if list.len() >= self.chunk_size {
        Some(mem::replace(&mut *list, Vec::with_capacity(self.chunk_size)))
      } else {
        None
      }
    };
    match full {
      Some(chunk) => self.target.accept(chunk, metadata),
      None => Ok(()),
    }
  }

  fn commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    let rest = self.take_remaining();
    if !rest.is_empty() {
      self.target.accept(rest, metadata)?;
    }
    self.target.commit(metadata)
  }
}

impl<T, S> CloneableSink<T> for ListAggregator<T, S>
where
  T: Send,
  S: CloneableSink<Vec<T>>,
{
  fn create_clone(&self) -> Result<Self, SinkError> {
    Ok(Self {
      chunk_size: self.chunk_size,
      list: Mutex::new(Vec::with_capacity(self.chunk_size)),
      target: self.target.create_clone()?,
    })
  }

  fn partial_commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    let rest = self.take_remaining();
    if !rest.is_empty() {
      self.target.accept(rest, metadata)?;
    }
    self.target.partial_commit(metadata)
  }
}

impl<T, S> ThreadsafeSink<T> for ListAggregator<T, S>
where
  T: Send,
  S: ThreadsafeSink<Vec<T>>,
{
}
