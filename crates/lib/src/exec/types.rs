//! Driver state and error types.

use thiserror::Error;

use crate::classpath::LoadError;

/// Exact line written to the error stream when no entry point exists.
pub const NO_MAIN_MESSAGE: &str = "No main method found";

/// Exact line written to the error stream when the entry point's shape does
/// not permit invocation.
pub const MAIN_NOT_ACCESSIBLE_MESSAGE: &str = "Main method is not public or static";

/// Lifecycle of a driver: `Idle -> Running -> {Completed | Failed} -> Idle`
/// (the last transition via an explicit reload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
  Idle,
  Running,
  Completed,
  Failed,
}

/// Errors surfaced by a run. Every variant has already been written to the
/// run's error stream by the time the caller sees it; the host process is
/// never taken down.
#[derive(Debug, Error)]
pub enum ExecError {
  /// The class could not be resolved through the aggregate classpath.
  #[error("class resolution failed: {0}")]
  Resolution(#[from] LoadError),

  /// The resolved class has no `main(String[])`.
  #[error("no main method found in {class}")]
  NoMainMethod { class: String },

  /// `main` exists but is not invocable (not public, or neither static nor
  /// reachable through a public no-argument constructor).
  #[error("main method in {class} is not public or static")]
  MainNotAccessible { class: String },

  /// The invocation itself failed; the message was written to the error
  /// stream.
  #[error("invocation failed: {message}")]
  Invocation { message: String },

  /// Another run is active on this driver.
  #[error("a run is already active")]
  AlreadyRunning,

  /// Cancellation was requested before invocation.
  #[error("run cancelled")]
  Cancelled,
}
