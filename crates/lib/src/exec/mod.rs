//! Entry-point execution.
//!
//! The driver resolves a class through the aggregate classpath, validates
//! the shape of its `main(String[])` entry point against the container's
//! access flags, and hands the invocation to a [`MethodRuntime`], the
//! boundary behind which the actual interpreter/VM lives. All program
//! output flows through explicit, scoped stream handles; nothing in this
//! module touches process-global stdio.
//!
//! # Submodules
//!
//! - [`driver`] - Run orchestration and the run state machine
//! - [`context`] - Owned output/input stream handles
//! - [`runtime`] - The invocation capability boundary

pub mod context;
pub mod driver;
pub mod runtime;
mod types;

pub use context::{
  ChannelInput, EmptyInput, ExecutionContext, InputSource, OutputChunk, OutputPipe, OutputReceiver, PipeWriter,
  StreamKind,
};
pub use driver::{ExecutionDriver, InputFactory, OutputObserver};
pub use runtime::{InvokeError, InvokeRequest, MethodRuntime, VmRuntime};
pub use types::*;
