//! # Aggregating Sinks
//!
//! Thread-safe buffers grouping single items into `Vec` chunks before handing
//! them to a downstream `Sink<Vec<T>>`.
//!
//! - [`QueueAggregator`]: items go into a fixed-capacity lock-free queue. The
//!   producer that finds the queue full tries to take the flush lock; the
//!   winner drains and forwards one chunk, everybody else backs off briefly
//!   and retries.
//! - [`ListAggregator`]: items are appended to a list under a mutex; the
//!   producer that completes a chunk swaps in a fresh list and forwards the
//!   full one after releasing the lock.
//!
//! Both flush the partial remainder on `commit`. Items keep their order
//! inside a chunk; producers racing each other only get the guarantee that
//! each item lands in exactly one forwarded chunk.

mod list;
mod queue;

pub use list::ListAggregator;
pub use queue::QueueAggregator;
