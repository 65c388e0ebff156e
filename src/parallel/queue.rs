//! Bounded per-worker queue.
//!
//! One owner dequeues (blocking or not); many producers enqueue: the
//! dispatching thread, and the commit coordinator injecting markers. Peers
//! steal from the front without ever taking a synchronization marker.

use super::barrier::SyncPoint;
use crate::metadata::Metadata;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// What travels through a worker queue.
pub(crate) enum Task<T> {
  /// An accepted item and the metadata it was accepted with.
  Item { item: T, metadata: Metadata },
  /// Commit boundary for the current cycle.
  Marker(SyncMarker),
}

impl<T> Task<T> {
  pub(crate) fn is_item(&self) -> bool {
    matches!(self, Task::Item { .. })
  }
}

/// Barrier and metadata of one commit cycle.
#[derive(Clone)]
pub(crate) struct SyncMarker {
  pub(crate) point: Arc<SyncPoint>,
  pub(crate) metadata: Metadata,
  pub(crate) generation: u64,
}

/// A blocking queue operation was interrupted, or the queue is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Interrupted;

struct State<M> {
  items: VecDeque<M>,
  /// Bumped by every `interrupt`; a blocked operation fails once it sees a
  /// value other than the one it started with.
  epoch: u64,
  closed: bool,
}

impl<M> State<M> {
  fn check(&self, epoch: u64) -> Result<(), Interrupted> {
    if self.closed || self.epoch != epoch {
      return Err(Interrupted);
    }
    Ok(())
  }
}

pub(crate) struct WorkQueue<M> {
  capacity: usize,
  state: Mutex<State<M>>,
  not_empty: Condvar,
  not_full: Condvar,
}

impl<M> WorkQueue<M> {
  pub(crate) fn new(capacity: usize) -> Self {
    Self {
      capacity,
      state: Mutex::new(State {
        items: VecDeque::with_capacity(capacity),
        epoch: 0,
        closed: false,
      }),
      not_empty: Condvar::new(),
      not_full: Condvar::new(),
    }
  }

  /// Non-blocking enqueue. Hands the value back when the queue is full.
  pub(crate) fn offer(&self, value: M) -> Result<(), M> {
    let mut state = self.state.lock();
    if state.items.len() >= self.capacity {
      return Err(value);
    }
    state.items.push_back(value);
    drop(state);
    self.not_empty.notify_one();
    Ok(())
  }

  /// Blocking enqueue: waits for capacity.
  pub(crate) fn put(&self, value: M) -> Result<(), Interrupted> {
    let mut state = self.state.lock();
    let epoch = state.epoch;
    loop {
      state.check(epoch)?;
      if state.items.len() < self.capacity {
        break;
      }
      self.not_full.wait(&mut state);
    }
    state.items.push_back(value);
    drop(state);
    self.not_empty.notify_one();
    Ok(())
  }

  /// Enqueue ignoring capacity. Reserved for commit markers so the
  /// coordinator never blocks behind a full queue.
  pub(crate) fn force(&self, value: M) {
    self.state.lock().items.push_back(value);
    self.not_empty.notify_one();
  }

  /// Non-blocking dequeue from the front.
  pub(crate) fn poll(&self) -> Option<M> {
    self.poll_if(|_| true)
  }

  /// Dequeues the front value only if `accept` approves of it.
  pub(crate) fn poll_if(&self, accept: impl FnOnce(&M) -> bool) -> Option<M> {
    let mut state = self.state.lock();
    if !state.items.front().is_some_and(accept) {
      return None;
    }
    let value = state.items.pop_front();
    drop(state);
    self.not_full.notify_one();
    value
  }

  /// Blocking dequeue.
  pub(crate) fn take(&self) -> Result<M, Interrupted> {
    let mut state = self.state.lock();
    let epoch = state.epoch;
    loop {
      state.check(epoch)?;
      if let Some(value) = state.items.pop_front() {
        drop(state);
        self.not_full.notify_one();
        return Ok(value);
      }
      self.not_empty.wait(&mut state);
    }
  }

  /// Fails the blocking operations waiting on this queue right now.
  /// Operations started afterwards are not affected.
  pub(crate) fn interrupt(&self) {
    self.state.lock().epoch += 1;
    self.not_empty.notify_all();
    self.not_full.notify_all();
  }

  /// Fails every current and future blocking operation.
  pub(crate) fn close(&self) {
    self.state.lock().closed = true;
    self.not_empty.notify_all();
    self.not_full.notify_all();
  }

  /// Runs `retire` under the queue lock if the queue is empty, so no
  /// enqueue can slip in between the check and `retire`.
  pub(crate) fn retire_if_empty(&self, retire: impl FnOnce()) -> bool {
    let state = self.state.lock();
    if !state.items.is_empty() {
      return false;
    }
    retire();
    true
  }

  pub(crate) fn len(&self) -> usize {
    self.state.lock().items.len()
  }

  #[cfg(test)]
  pub(crate) fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<T> WorkQueue<Task<T>> {
  /// Takes the front item for a peer. Never takes a marker: stealing stops
  /// at the donor's commit boundary.
  pub(crate) fn steal(&self) -> Option<(T, Metadata)> {
    match self.poll_if(Task::is_item) {
      Some(Task::Item { item, metadata }) => Some((item, metadata)),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;
  use std::time::Duration;

  fn marker() -> Task<u32> {
    Task::Marker(SyncMarker {
      point: Arc::new(SyncPoint::new()),
      metadata: Metadata::new(),
      generation: 0,
    })
  }

  fn item(n: u32) -> Task<u32> {
    Task::Item {
      item: n,
      metadata: Metadata::new(),
    }
  }

  #[test]
  fn test_offer_respects_capacity() {
    let queue = WorkQueue::new(2);
    assert!(queue.offer(1).is_ok());
    assert!(queue.offer(2).is_ok());
    assert_eq!(queue.offer(3), Err(3));
    assert_eq!(queue.poll(), Some(1));
    assert!(queue.offer(3).is_ok());
    assert_eq!(queue.len(), 2);
  }

  #[test]
  fn test_force_exceeds_capacity() {
    let queue = WorkQueue::new(1);
    queue.offer(1).unwrap();
    queue.force(2);
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.take(), Ok(1));
    assert_eq!(queue.take(), Ok(2));
  }

  #[test]
  fn test_steal_stops_at_marker() {
    let queue = WorkQueue::new(4);
    queue.offer(item(1)).ok().unwrap();
    queue.offer(marker()).ok().unwrap();
    queue.offer(item(2)).ok().unwrap();

    assert_eq!(queue.steal().map(|(n, _)| n), Some(1));
    assert!(queue.steal().is_none());
    assert_eq!(queue.len(), 2);
    assert!(matches!(queue.poll(), Some(Task::Marker(_))));
    assert_eq!(queue.steal().map(|(n, _)| n), Some(2));
  }

  #[test]
  fn test_put_blocks_until_space() {
    let queue = Arc::new(WorkQueue::new(1));
    queue.offer(1).unwrap();
    let producer = {
      let queue = Arc::clone(&queue);
      thread::spawn(move || queue.put(2))
    };
    thread::sleep(Duration::from_millis(20));
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.take(), Ok(1));
    assert_eq!(producer.join().unwrap(), Ok(()));
    assert_eq!(queue.take(), Ok(2));
  }

  #[test]
  fn test_interrupt_wakes_blocked_take_once() {
    let queue: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::new(1));
    let consumer = {
      let queue = Arc::clone(&queue);
      thread::spawn(move || queue.take())
    };
    thread::sleep(Duration::from_millis(20));
    queue.interrupt();
    assert_eq!(consumer.join().unwrap(), Err(Interrupted));

    queue.offer(5).unwrap();
    assert_eq!(queue.take(), Ok(5));
  }

  #[test]
  fn test_interrupt_without_waiters_is_forgotten() {
    let queue = Arc::new(WorkQueue::new(1));
    queue.interrupt();
    assert_eq!(queue.put(1), Ok(()));

    let producer = {
      let queue = Arc::clone(&queue);
      thread::spawn(move || queue.put(2))
    };
    thread::sleep(Duration::from_millis(20));
    assert_eq!(queue.take(), Ok(1));
    assert_eq!(producer.join().unwrap(), Ok(()));
  }

  #[test]
  fn test_interrupt_wakes_blocked_put() {
    let queue = Arc::new(WorkQueue::new(1));
    queue.offer(1).unwrap();
    let producer = {
      let queue = Arc::clone(&queue);
      thread::spawn(move || queue.put(2))
    };
    thread::sleep(Duration::from_millis(20));
    queue.interrupt();
    assert_eq!(producer.join().unwrap(), Err(Interrupted));
    assert_eq!(queue.len(), 1);
  }

  #[test]
  fn test_close_fails_later_operations() {
    let queue = WorkQueue::new(2);
    queue.offer(1).unwrap();
    queue.close();
    assert_eq!(queue.take(), Err(Interrupted));
    assert_eq!(queue.put(2), Err(Interrupted));
    assert_eq!(queue.poll(), Some(1));
  }

  #[test]
  fn test_retire_only_when_empty() {
    let queue = WorkQueue::new(2);
    queue.offer(1).unwrap();
    let mut retired = false;
    assert!(!queue.retire_if_empty(|| retired = true));
    assert!(!retired);
    queue.poll();
    assert!(queue.retire_if_empty(|| retired = true));
    assert!(retired);
  }
}
