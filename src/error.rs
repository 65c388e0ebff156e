//! # Error Handling
//!
//! Errors produced by sinks, aggregators and the parallel engine.
//!
//! ## Taxonomy
//!
//! - **Item faults**: anything a sink returns from `accept`/`commit`, wrapped in
//!   [`SinkError::Other`] (or [`SinkError::Panicked`] when a worker caught a panic).
//!   Inside the parallel engine these are captured per worker and surfaced from
//!   the next `commit`.
//! - **Configuration faults**: [`ConfigError`], reported synchronously by
//!   constructors.
//! - **Interruption**: [`SinkError::Interrupted`], returned only to a producer
//!   whose blocking enqueue was interrupted. Workers swallow it.
//!
//! ## Example
//!
//! ```rust
//! use sinkweave::error::SinkError;
//!
//! let err = SinkError::msg("disk full");
//! assert_eq!(err.to_string(), "disk full");
//! ```

use std::error::Error;
use std::fmt;

/// Error returned by [`Sink`](crate::sink::Sink) operations.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
  /// Implementation-defined failure raised by a sink.
  #[error("{0}")]
  Other(#[source] Box<dyn Error + Send + Sync>),

  /// A panic caught inside a worker run loop.
  #[error("{component} panicked: {message}")]
  Panicked {
    /// Component whose run loop panicked.
    component: ComponentInfo,
    /// Panic payload, when it was a string.
    message: String,
  },

  /// A blocking enqueue was interrupted; the item was not accepted.
  #[error("interrupted while waiting for queue capacity")]
  Interrupted,

  /// Invalid construction-time configuration.
  #[error(transparent)]
  Config(#[from] ConfigError),
}

impl SinkError {
  /// Wraps an arbitrary error.
  pub fn new<E>(error: E) -> Self
  where
    E: Error + Send + Sync + 'static,
  {
    SinkError::Other(Box::new(error))
  }

  /// Creates an error from a plain message.
  pub fn msg(message: impl Into<String>) -> Self {
    SinkError::Other(Box::new(StringError(message.into())))
  }

  /// Returns true for [`SinkError::Interrupted`].
  pub fn is_interrupted(&self) -> bool {
    matches!(self, SinkError::Interrupted)
  }
}

/// Construction-time configuration fault.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  /// Parallelism must be at least one worker.
  #[error("parallelism must be greater than zero")]
  ZeroParallelism,

  /// Worker queues must hold at least one item.
  #[error("queue size must be greater than zero")]
  ZeroQueueSize,

  /// Aggregators need a chunk size of at least one.
  #[error("chunk size must be greater than zero")]
  ZeroChunkSize,

  /// Creating the per-worker clone of a cloneable target failed.
  #[error("failed to clone target for worker slot {slot}")]
  CloneFailed {
    /// Ring slot the clone was created for.
    slot: usize,
    /// Error returned by `create_clone`.
    #[source]
    source: Box<SinkError>,
  },
}

/// A simple error type that wraps a string message.
#[derive(Debug)]
pub struct StringError(pub String);

impl fmt::Display for StringError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl Error for StringError {}

/// Information about a pipeline component.
///
/// Identifies the component (engine name and worker slot for the parallel
/// engine) in panics and log records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
  /// The name of the component.
  pub name: String,
  /// The type name of the component.
  pub type_name: String,
}

impl Default for ComponentInfo {
  fn default() -> Self {
    Self {
      name: "default".to_string(),
      type_name: "default".to_string(),
    }
  }
}

impl ComponentInfo {
  /// Creates a new `ComponentInfo` with the given name and type name.
  pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      type_name: type_name.into(),
    }
  }
}

impl fmt::Display for ComponentInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.name, self.type_name)
  }
}
