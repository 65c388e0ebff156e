use crate::error::SinkError;
use crate::metadata::Metadata;
use crate::sink::{Sink, ThreadsafeSink};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread-safe terminal sink collecting every accepted item.
#[derive(Debug, Default)]
pub struct VecSink<T> {
  vec: Mutex<Vec<T>>,
  commits: AtomicUsize,
}

impl<T> VecSink<T> {
  /// Creates an empty sink.
  pub fn new() -> Self {
    Self {
      vec: Mutex::new(Vec::new()),
      commits: AtomicUsize::new(0),
    }
  }

  /// Creates an empty sink with preallocated capacity.
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      vec: Mutex::new(Vec::with_capacity(capacity)),
      commits: AtomicUsize::new(0),
    }
  }

  /// Number of items collected.
  pub fn len(&self) -> usize {
    self.vec.lock().len()
  }

  /// True when nothing has been collected.
  pub fn is_empty(&self) -> bool {
    self.vec.lock().is_empty()
  }

  /// Number of `commit` calls observed.
  pub fn commits(&self) -> usize {
    self.commits.load(Ordering::Acquire)
  }

  /// Consumes the sink, returning the collected items.
  pub fn into_vec(self) -> Vec<T> {
    self.vec.into_inner()
  }
}

impl<T: Clone> VecSink<T> {
  /// Snapshot of the collected items, in acceptance order.
  pub fn items(&self) -> Vec<T> {
    self.vec.lock().clone()
  }
}

impl<T: Send> Sink<T> for VecSink<T> {
  fn accept(&self, item: T, _metadata: &Metadata) -> Result<(), SinkError> {
    self.vec.lock().push(item);
    Ok(())
  }

  fn commit(&self, _metadata: &Metadata) -> Result<(), SinkError> {
    self.commits.fetch_add(1, Ordering::AcqRel);
    Ok(())
  }
}

impl<T: Send> ThreadsafeSink<T> for VecSink<T> {}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::thread;

  #[test]
  fn test_vec_sink_collects_in_order() {
    let sink = VecSink::with_capacity(3);
    let md = Metadata::new();
    sink.accept("a", &md).unwrap();
    sink.accept("b", &md).unwrap();
    sink.commit(&md).unwrap();

    assert_eq!(sink.len(), 2);
    assert_eq!(sink.commits(), 1);
    assert_eq!(sink.into_vec(), vec!["a", "b"]);
  }

  #[test]
  fn test_vec_sink_shared_between_threads() {
    let sink = Arc::new(VecSink::new());
    let handles: Vec<_> = (0..4)
      .map(|t| {
        let sink = Arc::clone(&sink);
        thread::spawn(move || {
          let md = Metadata::new();
          for i in 0..100 {
            sink.accept(t * 100 + i, &md).unwrap();
          }
        })
      })
      .collect();
    for handle in handles {
      handle.join().unwrap();
    }

    let mut items = sink.items();
    items.sort_unstable();
    assert_eq!(items, (0..400).collect::<Vec<_>>());
  }
}
