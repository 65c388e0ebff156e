use crate::error::SinkError;
use crate::metadata::Metadata;
use crate::sink::{CloneableSink, Sink, ThreadsafeSink};

/// Accepts collection-like items and forwards each element individually, in
/// iteration order.
///
/// Stops at the first element the target rejects; the remaining elements of
/// that collection are not forwarded.
#[derive(Debug)]
pub struct DecomposeSink<S> {
  target: S,
}

impl<S> DecomposeSink<S> {
  /// Wraps `target`.
  pub fn new(target: S) -> Self {
    Self { target }
  }

  /// The downstream sink.
  pub fn target(&self) -> &S {
    &self.target
  }

  /// Unwraps the downstream sink.
  pub fn into_target(self) -> S {
    self.target
  }
}

impl<C, S> Sink<C> for DecomposeSink<S>
where
  C: IntoIterator,
  S: Sink<C::Item>,
{
  fn accept(&self, items: C, metadata: &Metadata) -> Result<(), SinkError> {
    for item in items {
      self.target.accept(item, metadata)?;
    }
    Ok(())
  }

  fn commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    self.target.commit(metadata)
  }
}

impl<C, S> CloneableSink<C> for DecomposeSink<S>
where
  C: IntoIterator,
  S: CloneableSink<C::Item>,
{
  fn create_clone(&self) -> Result<Self, SinkError> {
    Ok(Self {
      target: self.target.create_clone()?,
    })
  }

  fn partial_commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    self.target.partial_commit(metadata)
  }
}

impl<C, S> ThreadsafeSink<C> for DecomposeSink<S>
where
  C: IntoIterator,
  S: ThreadsafeSink<C::Item>,
{
}
