//! Two-phase countdown used to synchronize one commit cycle.
//!
//! Registration happens on the coordinating thread while it walks the ring;
//! it closes when the coordinator itself arrives and starts waiting. The
//! participant count never changes after that. Workers may arrive before
//! registration closes.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Counts {
  parties: usize,
  arrived: usize,
  closed: bool,
}

#[derive(Debug, Default)]
pub(crate) struct SyncPoint {
  counts: Mutex<Counts>,
  all_arrived: Condvar,
}

impl SyncPoint {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Adds one worker participant. Only valid before registration closes.
  pub(crate) fn register(&self) {
    let mut counts = self.counts.lock();
    debug_assert!(!counts.closed, "registration after the barrier closed");
    counts.parties += 1;
  }

  /// Signals that one participant reached the boundary.
  pub(crate) fn arrive(&self) {
    let mut counts = self.counts.lock();
    counts.arrived += 1;
    if counts.closed && counts.arrived >= counts.parties {
      self.all_arrived.notify_all();
    }
  }

  /// Closes registration, counts the caller as one more participant, and
  /// waits for everybody. Returns false when `timeout` elapsed first.
  pub(crate) fn arrive_and_wait(&self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut counts = self.counts.lock();
    counts.closed = true;
    counts.parties += 1;
    counts.arrived += 1;
    while counts.arrived < counts.parties {
      if self.all_arrived.wait_until(&mut counts, deadline).timed_out() {
        return counts.arrived >= counts.parties;
      }
    }
    true
  }

  /// Registered participants, the coordinator included once it waited.
  pub(crate) fn parties(&self) -> usize {
    self.counts.lock().parties
  }

  /// Participants that have not arrived yet.
  pub(crate) fn outstanding(&self) -> usize {
    let counts = self.counts.lock();
    counts.parties.saturating_sub(counts.arrived)
  }
}
