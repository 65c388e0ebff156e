use crate::error::SinkError;
use crate::metadata::Metadata;
use crate::sink::{CloneableSink, Sink, ThreadsafeSink};

/// Forwards only the items for which the predicate returns true.
///
/// The predicate never mutates the item. Errors from the target propagate to
/// the caller of `accept`.
#[derive(Debug)]
pub struct FilterSink<S, P> {
  predicate: P,
  target: S,
}

impl<S, P> FilterSink<S, P> {
  /// Wraps `target` behind `predicate`.
  pub fn new(target: S, predicate: P) -> Self {
    Self { predicate, target }
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

impl<T, S, P> Sink<T> for FilterSink<S, P>
where
  S: Sink<T>,
  P: Fn(&T) -> bool + Send,
{
  fn accept(&self, item: T, metadata: &Metadata) -> Result<(), SinkError> {
    if (self.predicate)(&item) {
      self.target.accept(item, metadata)?;
    }
    Ok(())
  }

  fn commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    self.target.commit(metadata)
  }
}

impl<T, S, P> CloneableSink<T> for FilterSink<S, P>
where
  S: CloneableSink<T>,
  P: Fn(&T) -> bool + Send + Clone,
{
  fn create_clone(&self) -> Result<Self, SinkError> {
    Ok(Self {
      predicate: self.predicate.clone(),
      target: self.target.create_clone()?,
    })
  }

  fn partial_commit(&self, metadata: &Metadata) -> Result<(), SinkError> {
    self.target.partial_commit(metadata)
  }
}

impl<T, S, P> ThreadsafeSink<T> for FilterSink<S, P>
where
  S: ThreadsafeSink<T>,
  P: Fn(&T) -> bool + Send + Sync,
{
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sinks::VecSink;

  #[test]
  fn test_filter_even_numbers() {
    let sink = FilterSink::new(VecSink::new(), |x: &i32| x % 2 == 0);
    let md = Metadata::new();
    for i in 1..=6 {
      sink.accept(i, &md).unwrap();
    }
    sink.commit(&md).unwrap();

    assert_eq!(sink.target().items(), vec![2, 4, 6]);
    assert_eq!(sink.target().commits(), 1);
  }

  #[test]
  fn test_filter_rejecting_everything_still_commits() {
    let sink = FilterSink::new(VecSink::new(), |_: &i32| false);
    let md = Metadata::new();
    sink.accept(1, &md).unwrap();
    sink.commit(&md).unwrap();

    assert!(sink.target().items().is_empty());
    assert_eq!(sink.target().commits(), 1);
  }
}
