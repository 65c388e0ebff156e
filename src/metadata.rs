//! Per-call context threaded through every `accept` and `commit`.
//!
//! [`Metadata`] is opaque to the pipeline: sinks pass it along unchanged and
//! never look inside. It carries a small set of string attributes for the
//! caller's own use. Cloning is a reference-count bump, so the parallel engine
//! can attach it to every queued item.
//!
//! ```rust
//! use sinkweave::metadata::Metadata;
//!
//! let md = Metadata::new().with("source", "orders").with("tenant", "acme");
//! assert_eq!(md.get("tenant"), Some("acme"));
//! assert_eq!(md.get("offset"), None);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

/// Opaque, immutable-by-convention call context.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
  attributes: Arc<BTreeMap<String, String>>,
}

impl Metadata {
  /// Empty context.
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns a context with `name` set to `value`. Other clones of `self`
  /// are left untouched.
  #[must_use]
  pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    Arc::make_mut(&mut self.attributes).insert(name.into(), value.into());
    self
  }

  /// Attribute lookup.
  pub fn get(&self, name: &str) -> Option<&str> {
    self.attributes.get(name).map(String::as_str)
  }

  /// True when no attribute is set.
  pub fn is_empty(&self) -> bool {
    self.attributes.is_empty()
  }
}
