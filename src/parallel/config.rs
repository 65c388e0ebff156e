use super::supervision::SupervisionPolicy;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

const DEFAULT_QUEUE_SIZE: usize = 64;
const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for a [`ParallelSink`](super::ParallelSink).
///
/// The ring size (`parallelism`) and per-worker `queue_size` are fixed for the
/// engine's lifetime.
///
/// ```rust
/// use sinkweave::parallel::ParallelConfig;
/// use std::time::Duration;
///
/// let config = ParallelConfig::default()
///   .with_name("ingest".to_string())
///   .with_parallelism(4)
///   .with_queue_size(16)
///   .with_commit_timeout(Duration::from_secs(30));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
  /// Name used in logs and fault reports.
  pub name: String,
  /// Number of workers in the ring.
  pub parallelism: usize,
  /// Capacity of each worker queue.
  pub queue_size: usize,
  /// How long `commit` waits for the workers before logging and moving on.
  pub commit_timeout: Duration,
  /// What to do when a worker run loop panics.
  pub supervision: SupervisionPolicy,
}

impl Default for ParallelConfig {
  fn default() -> Self {
    Self {
      name: "parallel_sink".to_string(),
      parallelism: thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1),
      queue_size: DEFAULT_QUEUE_SIZE,
      commit_timeout: DEFAULT_COMMIT_TIMEOUT,
      supervision: SupervisionPolicy::default(),
    }
  }
}

impl ParallelConfig {
  /// Sets the name for this engine.
  #[must_use]
  pub fn with_name(mut self, name: String) -> Self {
    self.name = name;
    self
  }

  /// Sets the ring size.
  #[must_use]
  pub fn with_parallelism(mut self, parallelism: usize) -> Self {
    self.parallelism = parallelism;
    self
  }

  /// Sets the per-worker queue capacity.
  #[must_use]
  pub fn with_queue_size(mut self, queue_size: usize) -> Self {
    self.queue_size = queue_size;
    self
  }

  /// Sets the commit barrier timeout.
  #[must_use]
  pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
    self.commit_timeout = timeout;
    self
  }

  /// Sets the supervision policy.
  #[must_use]
  pub fn with_supervision(mut self, policy: SupervisionPolicy) -> Self {
    self.supervision = policy;
    self
  }

  /// Construction-time checks.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.parallelism == 0 {
      return Err(ConfigError::ZeroParallelism);
    }
    if self.queue_size == 0 {
      return Err(ConfigError::ZeroQueueSize);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parallel::FailureAction;

  #[test]
  fn test_default_is_valid() {
    let config = ParallelConfig::default();
    assert!(config.parallelism >= 1);
    assert_eq!(config.queue_size, 64);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_zero_values_rejected() {
    let config = ParallelConfig::default().with_parallelism(0);
    assert!(matches!(config.validate(), Err(ConfigError::ZeroParallelism)));
    let config = ParallelConfig::default().with_queue_size(0);
    assert!(matches!(config.validate(), Err(ConfigError::ZeroQueueSize)));
  }

  #[test]
  fn test_partial_json_keeps_defaults() {
    let config: ParallelConfig =
      serde_json::from_str(r#"{"parallelism":3,"supervision":{"on_failure":"stop"}}"#).unwrap();
    assert_eq!(config.parallelism, 3);
    assert_eq!(config.queue_size, 64);
    assert_eq!(config.name, "parallel_sink");
    assert_eq!(config.supervision.on_failure, FailureAction::Stop);
    assert_eq!(config.supervision.max_restarts, None);
  }

  #[test]
  fn test_json_round_trip() {
    let config = ParallelConfig::default()
      .with_name("rt".to_string())
      .with_parallelism(2)
      .with_commit_timeout(Duration::from_millis(1500));
    let json = serde_json::to_string(&config).unwrap();
    let back: ParallelConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
  }
}
