//! Structured build/run event reporting.
//!
//! A [`BuildReporter`] wraps a caller-supplied callback and delivers one
//! immutable [`BuildReport`] per event, synchronously, from whichever task
//! produced it. It also tracks overall state in two flags: `build_success`
//! (set only by an explicit success report) and `failure` (set by any error
//! report and never reset for the reporter's lifetime).
//!
//! The flags are atomics because reports arrive concurrently from the
//! primary compile path and from background library compilations. The
//! callback itself is a propagation boundary: panics raised inside it are
//! not caught here.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::consts::BUILD_SUCCESS_MESSAGE;

/// Severity/channel of a single report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportKind {
  Info,
  Warning,
  Error,
  Logging,
  Output,
}

impl fmt::Display for ReportKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ReportKind::Info => "info",
      ReportKind::Warning => "warning",
      ReportKind::Error => "error",
      ReportKind::Logging => "logging",
      ReportKind::Output => "output",
    };
    write!(f, "{}", name)
  }
}

/// One immutable build/run event. Created per report call, consumed exactly
/// once by the registered callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
  pub kind: ReportKind,
  pub message: String,
}

/// Callback receiving each report. Caller decides rendering.
pub type ReportCallback = Arc<dyn Fn(&BuildReport) + Send + Sync>;

struct ReporterState {
  callback: ReportCallback,
  build_success: AtomicBool,
  failure: AtomicBool,
}

/// Process-local sink for build/run events.
///
/// Clones share the same callback and flags, so a reporter can be handed to
/// background library tasks while the caller keeps observing the flags.
/// Created per build invocation, discarded after.
#[derive(Clone)]
pub struct BuildReporter {
  state: Arc<ReporterState>,
}

impl BuildReporter {
  pub fn new(callback: ReportCallback) -> Self {
    Self {
      state: Arc::new(ReporterState {
        callback,
        build_success: AtomicBool::new(false),
        failure: AtomicBool::new(false),
      }),
    }
  }

  /// Reporter that drops every event. Useful for embedders that only care
  /// about the flags.
  pub fn discarding() -> Self {
    Self::new(Arc::new(|_| {}))
  }

  fn deliver(&self, kind: ReportKind, message: String) {
    let report = BuildReport { kind, message };
    (self.state.callback)(&report);
  }

  pub fn report_info(&self, message: impl Into<String>) {
    let message = message.into();
    info!(message = %message, "build event");
    self.deliver(ReportKind::Info, message);
  }

  pub fn report_warning(&self, message: impl Into<String>) {
    let message = message.into();
    warn!(message = %message, "build event");
    self.deliver(ReportKind::Warning, message);
  }

  /// Deliver an error report and latch the sticky failure flag.
  pub fn report_error(&self, message: impl Into<String>) {
    let message = message.into();
    error!(message = %message, "build event");
    self.state.failure.store(true, Ordering::SeqCst);
    self.deliver(ReportKind::Error, message);
  }

  pub fn report_logging(&self, message: impl Into<String>) {
    let message = message.into();
    debug!(message = %message, "build event");
    self.deliver(ReportKind::Logging, message);
  }

  pub fn report_output(&self, message: impl Into<String>) {
    self.deliver(ReportKind::Output, message.into());
  }

  /// Emit the fixed success message as an Output report and mark the build
  /// as successful. Does not clear a previously latched failure.
  pub fn report_success(&self) {
    self.state.build_success.store(true, Ordering::SeqCst);
    self.deliver(ReportKind::Output, BUILD_SUCCESS_MESSAGE.to_string());
  }

  /// True once any error report has been delivered. Monotonic.
  pub fn failed(&self) -> bool {
    self.state.failure.load(Ordering::SeqCst)
  }

  /// True once `report_success` has been called.
  pub fn build_succeeded(&self) -> bool {
    self.state.build_success.load(Ordering::SeqCst)
  }
}

impl fmt::Debug for BuildReporter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BuildReporter")
      .field("build_success", &self.build_succeeded())
      .field("failure", &self.failed())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  fn recording_reporter() -> (BuildReporter, Arc<Mutex<Vec<BuildReport>>>) {
    let seen: Arc<Mutex<Vec<BuildReport>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let reporter = BuildReporter::new(Arc::new(move |report| {
      sink.lock().unwrap().push(report.clone());
    }));
    (reporter, seen)
  }

  #[test]
  fn each_kind_reaches_the_callback() {
    let (reporter, seen) = recording_reporter();

    reporter.report_info("i");
    reporter.report_warning("w");
    reporter.report_error("e");
    reporter.report_logging("l");
    reporter.report_output("o");

    let seen = seen.lock().unwrap();
    let kinds: Vec<ReportKind> = seen.iter().map(|r| r.kind).collect();
    assert_eq!(
      kinds,
      vec![
        ReportKind::Info,
        ReportKind::Warning,
        ReportKind::Error,
        ReportKind::Logging,
        ReportKind::Output,
      ]
    );
    assert_eq!(seen[2].message, "e");
  }

  #[test]
  fn failure_is_set_only_by_errors_and_is_sticky() {
    let (reporter, _) = recording_reporter();

    reporter.report_info("fine");
    reporter.report_warning("still fine");
    assert!(!reporter.failed());

    reporter.report_error("broken");
    assert!(reporter.failed());

    // Non-error reports afterwards must not clear the flag.
    reporter.report_info("later");
    reporter.report_success();
    assert!(reporter.failed());
  }

  #[test]
  fn success_sets_flag_and_emits_one_fixed_output_report() {
    let (reporter, seen) = recording_reporter();

    reporter.report_success();

    assert!(reporter.build_succeeded());
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, ReportKind::Output);
    assert_eq!(seen[0].message, BUILD_SUCCESS_MESSAGE);
  }

  #[test]
  fn clones_share_flags() {
    let (reporter, _) = recording_reporter();
    let clone = reporter.clone();

    clone.report_error("from background task");
    assert!(reporter.failed());
  }

  #[test]
  fn flags_are_safe_across_threads() {
    let (reporter, seen) = recording_reporter();

    let handles: Vec<_> = (0..8)
      .map(|i| {
        let reporter = reporter.clone();
        std::thread::spawn(move || {
          if i % 2 == 0 {
            reporter.report_error(format!("e{}", i));
          } else {
            reporter.report_info(format!("i{}", i));
          }
        })
      })
      .collect();
    for handle in handles {
      handle.join().unwrap();
    }

    assert!(reporter.failed());
    assert_eq!(seen.lock().unwrap().len(), 8);
  }
}
