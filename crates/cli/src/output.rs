//! Terminal rendering of reporter events and run output.

use owo_colors::OwoColorize;

use dexpipe_lib::exec::StreamKind;
use dexpipe_lib::report::{BuildReport, ReportKind};

/// Render one build event. Build chatter goes to stderr; Output reports
/// (program/success output) go to stdout.
pub fn render_report(report: &BuildReport) {
  match report.kind {
    ReportKind::Info => eprintln!("{} {}", "::".cyan().bold(), report.message),
    ReportKind::Warning => eprintln!("{} {}", "warning:".yellow().bold(), report.message),
    ReportKind::Error => eprintln!("{} {}", "error:".red().bold(), report.message),
    ReportKind::Logging => eprintln!("   {}", report.message.dimmed()),
    ReportKind::Output => println!("{}", report.message),
  }
}

/// Render one batch of run output on the matching host stream.
pub fn render_stream(stream: StreamKind, text: String) {
  match stream {
    StreamKind::Out => print!("{}", text),
    StreamKind::Err => eprint!("{}", text.red()),
  }
}
