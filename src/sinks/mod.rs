//! # Built-in Sinks
//!
//! Chaining sinks wrap exactly one downstream sink (their *target*) and apply
//! one operation per item:
//!
//! - [`FilterSink`]: forwards only items matching a predicate.
//! - [`MapSink`]: converts items; `None` suppresses forwarding.
//! - [`DecomposeSink`]: forwards each element of a collection item.
//! - [`ModifySink`]: touches the item in place and forwards it.
//!
//! Every chaining sink is [`CloneableSink`](crate::sink::CloneableSink) when
//! its target is (clone the target, rewrap), and
//! [`ThreadsafeSink`](crate::sink::ThreadsafeSink) when its target is and its
//! operation is `Sync`. `commit` and `partial_commit` pass straight through.
//!
//! Terminal sinks: [`VecSink`] collects items, [`FnSink`] calls a closure.
//!
//! [`SinkExt`] builds chains from the terminal sink outwards:
//!
//! ```rust
//! use sinkweave::metadata::Metadata;
//! use sinkweave::sink::Sink;
//! use sinkweave::sinks::{SinkExt, VecSink};
//!
//! let out = VecSink::new();
//! let chain = (&out)
//!   .filtered(|x: &i32| *x > 0)
//!   .mapped(|s: &str| s.parse::<i32>().ok());
//!
//! let md = Metadata::new();
//! for s in ["3", "-1", "oops", "5"] {
//!   chain.accept(s, &md).unwrap();
//! }
//! assert_eq!(out.items(), vec![3, 5]);
//! ```

mod decompose;
mod ext;
mod filter;
mod fn_sink;
mod map;
mod modify;
mod vec;

pub use decompose::DecomposeSink;
pub use ext::SinkExt;
pub use filter::FilterSink;
pub use fn_sink::FnSink;
pub use map::MapSink;
pub use modify::ModifySink;
pub use vec::VecSink;
