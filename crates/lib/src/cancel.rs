//! Cooperative cancellation for in-flight builds and runs.
//!
//! The signal is checked at each suspend point: before the primary compile,
//! before each library compile, and before entry-point invocation. Work that
//! has already started is not interrupted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cheaply cloneable cancellation flag shared between a caller and the
/// pipeline tasks it spawned. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
  cancelled: Arc<AtomicBool>,
}

impl CancelSignal {
  pub fn new() -> Self {
    Self::default()
  }

  /// Request cancellation. Idempotent.
  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::SeqCst)
  }
}
