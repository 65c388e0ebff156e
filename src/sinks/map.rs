use crate::error::SinkError;
use crate::metadata::Metadata;
use crate::sink::{CloneableSink, Sink, ThreadsafeSink};
use std::marker::PhantomData;

/// Converts each item before forwarding it.
///
/// A `None` result suppresses forwarding for that item.
pub struct MapSink<S, F, I, O> {
  convert: F,
  target: S,
  _phantom: PhantomData<fn(I) -> O>,
}

impl<S, F, I, O> MapSink<S, F, I, O>
where
  F: Fn(I) -> Option<O>,
{
  /// Wraps `target` behind `convert`.
  pub fn new(target: S, convert: F) -> Self {
    Self {
      convert,
      target,
      _phantom: PhantomData,
    }
  }
}

impl<S, F, I, O> MapSink<S, F, I, O> {
  /// The downstream sink.
  pub fn target(&self) -> &S {
    &self.target
  }

  /// Unwraps the downstream sink.
  pub fn into_target(self) -> S {
    self.target
  }
}

impl<S, F, I, O> Sink<I> for MapSink<S, F, I, O>
where
  S: Sink<O>,
  F: Fn(I) -> Option<O> + Send,
{
  fn accept(&self, item: I, metadata: &Metadata) -> Result<(), SinkError> {
    match (self.convert)(item) {
      Some(converted) => self.target.accept(converted, metadata),
      None => Ok(()),
    }
  }

  fn commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    self.target.commit(metadata)
  }
}

impl<S, F, I, O> CloneableSink<I> for MapSink<S, F, I, O>
where
  S: CloneableSink<O>,
  F: Fn(I) -> Option<O> + Send + Clone,
{
  fn create_clone(&self) -> Result<Self, SinkError> {
    Ok(Self {
      convert: self.convert.clone(),
      target: self.target.create_clone()?,
      _phantom: PhantomData,
    })
  }

  fn partial_commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    self.target.partial_commit(metadata)
  }
}

impl<S, F, I, O> ThreadsafeSink<I> for MapSink<S, F, I, O>
where
  S: ThreadsafeSink<O>,
  F: Fn(I) -> Option<O> + Send + Sync,
{
}
