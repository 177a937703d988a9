//! dexpipe-lib: Core types and logic for the dexpipe build & execution pipeline
//!
//! This crate provides the on-device pipeline that turns compiled program
//! units into runnable code:
//! - `report`: structured build/run event reporting with sticky failure state
//! - `compile`: class-file and library-jar compilation into DEX containers
//! - `dex`: a minimal reader for the Dalvik executable container format
//! - `classpath`: aggregation of many containers into one ordered classpath
//! - `exec`: entry-point resolution, validation and invocation

pub mod cancel;
pub mod classpath;
pub mod compile;
pub mod consts;
pub mod dex;
pub mod exec;
pub mod project;
pub mod report;
pub mod util;

pub use cancel::CancelSignal;
pub use classpath::ClasspathAggregator;
pub use compile::{CompileOutcome, CompileTask, CompilerConfig, D8Compiler};
pub use exec::{ExecutionDriver, MethodRuntime, RunState};
pub use project::ProjectLayout;
pub use report::{BuildReport, BuildReporter, ReportKind};
