//! Aggregator error and handle types.

use std::path::PathBuf;

use thiserror::Error;

use crate::dex::{ClassInfo, DexError, MethodInfo};

/// Errors raised while registering or resolving containers.
#[derive(Debug, Error)]
pub enum LoadError {
  /// Container file could not be read or locked read-only.
  #[error("failed to access container {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Container bytes are not a valid dex file.
  #[error("malformed container {path}: {source}")]
  Malformed {
    path: PathBuf,
    #[source]
    source: DexError,
  },

  /// The project's primary container has not been produced yet.
  #[error("primary container missing: {0}")]
  MissingContainer(PathBuf),

  /// No registered unit defines the requested name.
  #[error("class not found: {0}")]
  ClassNotFound(String),
}

/// A resolved class inside the aggregate classpath.
///
/// The handle exposes the listing half of the execution capability: callers
/// inspect methods here and hand the invocation itself to a
/// [`MethodRuntime`](crate::exec::MethodRuntime).
#[derive(Debug, Clone, Copy)]
pub struct ClassHandle<'a> {
  unit_index: usize,
  class: &'a ClassInfo,
}

impl<'a> ClassHandle<'a> {
  pub(crate) fn new(unit_index: usize, class: &'a ClassInfo) -> Self {
    Self { unit_index, class }
  }

  /// Index of the defining unit in load order.
  pub fn unit_index(&self) -> usize {
    self.unit_index
  }

  /// Binary name of the class.
  pub fn name(&self) -> String {
    self.class.binary_name()
  }

  /// All methods of the class, direct then virtual.
  pub fn list_methods(&self) -> &'a [MethodInfo] {
    &self.class.methods
  }

  /// Find a method by simple name and descriptor.
  pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&'a MethodInfo> {
    self.class.find_method(name, descriptor)
  }

  /// True when the class has a public no-argument constructor.
  pub fn has_public_noarg_constructor(&self) -> bool {
    self.class.has_public_noarg_constructor()
  }
}
