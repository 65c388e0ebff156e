use crate::error::SinkError;
use crate::metadata::Metadata;
use crate::sink::{CloneableSink, Sink, ThreadsafeSink};

/// Touches each item in place, then always forwards it.
#[derive(Debug)]
pub struct ModifySink<S, F> {
  touch: F,
  target: S,
}

impl<S, F> ModifySink<S, F> {
  /// Wraps `target` behind `touch`.
  pub fn new(target: S, touch: F) -> Self {
    Self { touch, target }
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

impl<T, S, F> Sink<T> for ModifySink<S, F>
where
  S: Sink<T>,
  F: Fn(&mut T) + Send,
{
  fn accept(&self, mut item: T, metadata: &Metadata) -> Result<(), SinkError> {
    (self.touch)(&mut item);
    self.target.accept(item, metadata)
  }

  fn commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    self.target.commit(metadata)
  }
}

impl<T, S, F> CloneableSink<T> for ModifySink<S, F>
where
  S: CloneableSink<T>,
  F: Fn(&mut T) + Send + Clone,
{
  fn create_clone(&self) -> Result<Self, SinkError> {
    Ok(Self {
      touch: self.touch.clone(),
      target: self.target.create_clone()?,
    })
  }

  fn partial_commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    self.target.partial_commit(metadata)
  }
}

impl<T, S, F> ThreadsafeSink<T> for ModifySink<S, F>
where
  S: ThreadsafeSink<T>,
  F: Fn(&mut T) + Send + Sync,
{
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sinks::VecSink;

  #[derive(Debug, Clone, PartialEq)]
  struct Record {
    id: u32,
    seen: bool,
  }

  #[test]
  fn test_modify_touches_then_forwards() {
    let sink = ModifySink::new(VecSink::new(), |r: &mut Record| r.seen = true);
    let md = Metadata::new();
    sink.accept(Record { id: 1, seen: false }, &md).unwrap();
    sink.accept(Record { id: 2, seen: true }, &md).unwrap();

    assert_eq!(
      sink.target().items(),
      vec![Record { id: 1, seen: true }, Record { id: 2, seen: true }]
    );
  }
}
