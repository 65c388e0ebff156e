use crate::error::SinkError;
use crate::metadata::Metadata;
use crate::sink::{CloneableSink, Sink, ThreadsafeSink};
use std::fmt;
use std::marker::PhantomData;

/// Terminal sink backed by a closure.
///
/// `commit` is a no-op. The sink is thread-safe when the closure is `Sync`,
/// and cloneable when the closure is `Clone` (clones share whatever the
/// closure captured, so capture owned state only if clones must be
/// independent).
pub struct FnSink<F, T> {
  f: F,
  _phantom: PhantomData<fn(T)>,
}

impl<F, T> FnSink<F, T>
where
  F: Fn(T, &Metadata) -> Result<(), SinkError>,
{
  /// Creates a sink calling `f` for every item.
  pub fn new(f: F) -> Self {
    Self {
      f,
      _phantom: PhantomData,
    }
  }
}

impl<F, T> fmt::Debug for FnSink<F, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FnSink").finish_non_exhaustive()
  }
}

impl<F, T> Sink<T> for FnSink<F, T>
where
  F: Fn(T, &Metadata) -> Result<(), SinkError> + Send,
{
  fn accept(&self, item: T, metadata: &Metadata) -> Result<(), SinkError> {
    (self.f)(item, metadata)
  }

  fn commit(&self, _metadata: &Metadata) -> Result<(), SinkError> {
    Ok(())
  }
}

impl<F, T> CloneableSink<T> for FnSink<F, T>
where
  F: Fn(T, &Metadata) -> Result<(), SinkError> + Send + Clone,
{
  fn create_clone(&self) -> Result<Self, SinkError> {
    Ok(Self {
      f: self.f.clone(),
      _phantom: PhantomData,
    })
  }
}

impl<F, T> ThreadsafeSink<T> for FnSink<F, T> where
  F: Fn(T, &Metadata) -> Result<(), SinkError> + Send + Sync
{
}
