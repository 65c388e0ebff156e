use crate::aggregate::{ListAggregator, QueueAggregator};
use crate::error::ConfigError;
use crate::sink::Sink;
use crate::sinks::{DecomposeSink, FilterSink, MapSink, ModifySink};

/// Combinators wrapping a sink as the downstream target of a new stage.
///
/// Chains are built from the terminal sink outwards: `out.filtered(p)`
/// returns a sink that filters items before handing them to `out`.
pub trait SinkExt<T>: Sink<T> + Sized {
  /// Drops items for which `predicate` returns false.
  fn filtered<P>(self, predicate: P) -> FilterSink<Self, P>
  where
    P: Fn(&T) -> bool + Send,
  {
    FilterSink::new(self, predicate)
  }

  /// Accepts `I` items, converting them to `T`. `None` drops the item.
  fn mapped<I, F>(self, convert: F) -> MapSink<Self, F, I, T>
  where
    F: Fn(I) -> Option<T> + Send,
  {
    MapSink::new(self, convert)
  }

  /// Accepts collections of `T`, forwarding elements one by one.
  fn decomposed(self) -> DecomposeSink<Self> {
    DecomposeSink::new(self)
  }

  /// Touches every item in place before forwarding it.
  fn modified<F>(self, touch: F) -> ModifySink<Self, F>
  where
    F: Fn(&mut T) + Send,
  {
    ModifySink::new(self, touch)
  }

  /// Groups single items into `Vec`s of `chunk_size` using a bounded
  /// lock-free queue.
  fn queue_batched<U>(self, chunk_size: usize) -> Result<QueueAggregator<U, Self>, ConfigError>
  where
    Self: Sink<Vec<U>>,
    U: Send,
  {
    QueueAggregator::new(self, chunk_size)
  }

  /// Groups single items into `Vec`s of `chunk_size` under a plain mutex.
  /// The result is shareable across threads when `self` is thread-safe.
  fn list_batched<U>(self, chunk_size: usize) -> Result<ListAggregator<U, Self>, ConfigError>
  where
    Self: Sink<Vec<U>>,
    U: Send,
  {
    ListAggregator::new(self, chunk_size)
  }
}

impl<T, S> SinkExt<T> for S where S: Sink<T> {}
