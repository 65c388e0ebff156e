//! Restart policy for worker run loops.
//!
//! A panic that escapes a sink inside a worker is caught, recorded as that
//! worker's pending fault, and the policy decides whether the run loop is
//! submitted to the executor again. Interruption is not a failure: an
//! interrupted loop never restarts itself.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Action to take when a worker run loop panics.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureAction {
  /// Relaunch the run loop, subject to `max_restarts`.
  Restart,
  /// Leave the worker idle until the next dispatch relaunches it.
  Stop,
}

/// Policy for supervising worker run loops.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisionPolicy {
  /// Action to take on failure.
  pub on_failure: FailureAction,
  /// Maximum consecutive restarts within one commit cycle. None = unbounded.
  pub max_restarts: Option<u32>,
  /// Delay before a restarted loop runs again.
  pub restart_backoff: Duration,
}

impl SupervisionPolicy {
  /// Creates a new policy with the given action and defaults.
  pub fn new(on_failure: FailureAction) -> Self {
    Self {
      on_failure,
      ..Self::default()
    }
  }

  /// Sets max restarts (None = unbounded).
  #[must_use]
  pub fn with_max_restarts(mut self, n: Option<u32>) -> Self {
    self.max_restarts = n;
    self
  }

  /// Sets restart backoff.
  #[must_use]
  pub fn with_restart_backoff(mut self, d: Duration) -> Self {
    self.restart_backoff = d;
    self
  }

  /// Whether the `attempt`-th consecutive restart (1-based) is allowed.
  pub fn allows_restart(&self, attempt: u32) -> bool {
    match self.on_failure {
      FailureAction::Stop => false,
      FailureAction::Restart => self.max_restarts.map_or(true, |max| attempt <= max),
    }
  }
}

impl Default for SupervisionPolicy {
  fn default() -> Self {
    // A restart never replays the item that panicked.
    Self {
      on_failure: FailureAction::Restart,
      max_restarts: None,
      restart_backoff: Duration::ZERO,
    }
  }
}
