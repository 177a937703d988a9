//! Compilation of program units into bytecode containers.
//!
//! The compile task turns a project's compiled class files into one primary
//! container and each library jar into its own cached container.
//!
//! # Submodules
//!
//! - [`task`] - The compilation task orchestrating primary and library compiles
//! - [`compiler`] - The external DEX compiler boundary
//! - [`cache`] - Content-hash cache for per-library outputs

pub mod cache;
pub mod compiler;
pub mod task;
mod types;

pub use compiler::{CompileRequest, D8Compiler, DexCompiler};
pub use task::CompileTask;
pub use types::*;
