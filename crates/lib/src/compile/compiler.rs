//! External DEX compiler boundary.
//!
//! Compilation is delegated to a `d8`-compatible tool. The [`DexCompiler`]
//! trait keeps the task testable and lets embedders substitute an in-process
//! compiler; [`D8Compiler`] is the production implementation shelling out to
//! the platform toolchain.

use std::ffi::OsString;
use std::path::PathBuf;

use tokio::process::Command;
use tracing::{debug, info};

use super::types::CompileError;
use crate::consts::D8_TOOL_ENV;

/// One compiler invocation: a set of program units merged into a single
/// container written to `output_dir`.
#[derive(Debug, Clone)]
pub struct CompileRequest {
  /// Class files or jar archives to compile.
  pub inputs: Vec<PathBuf>,

  /// Platform library jars to resolve against.
  pub classpath: Vec<PathBuf>,

  /// Minimum platform API level.
  pub min_api: u32,

  /// Debug (vs release) compilation mode.
  pub debug: bool,

  /// Directory receiving the produced `classes.dex`.
  pub output_dir: PathBuf,
}

/// Capability to turn program units into a container.
pub trait DexCompiler: Send + Sync + 'static {
  fn compile(&self, request: CompileRequest) -> impl Future<Output = Result<(), CompileError>> + Send;
}

/// Production compiler invoking the external `d8` tool.
#[derive(Debug, Clone)]
pub struct D8Compiler {
  tool: PathBuf,
}

impl D8Compiler {
  /// Tool resolved from the `DEXPIPE_D8` env var, falling back to `d8` on
  /// the search path.
  pub fn from_env() -> Self {
    let tool = std::env::var_os(D8_TOOL_ENV)
      .map(PathBuf::from)
      .unwrap_or_else(|| PathBuf::from("d8"));
    Self { tool }
  }

  pub fn with_tool(tool: PathBuf) -> Self {
    Self { tool }
  }
}

impl Default for D8Compiler {
  fn default() -> Self {
    Self::from_env()
  }
}

/// Argument list for one invocation.
fn build_args(request: &CompileRequest) -> Vec<OsString> {
  let mut args: Vec<OsString> = Vec::new();
  args.push("--min-api".into());
  args.push(request.min_api.to_string().into());
  args.push(if request.debug { "--debug" } else { "--release" }.into());
  for lib in &request.classpath {
    args.push("--lib".into());
    args.push(lib.clone().into());
  }
  args.push("--output".into());
  args.push(request.output_dir.clone().into());
  for input in &request.inputs {
    args.push(input.clone().into());
  }
  args
}

impl DexCompiler for D8Compiler {
  async fn compile(&self, request: CompileRequest) -> Result<(), CompileError> {
    tokio::fs::create_dir_all(&request.output_dir).await?;

    let args = build_args(&request);
    info!(
      tool = %self.tool.display(),
      inputs = request.inputs.len(),
      min_api = request.min_api,
      "invoking dex compiler"
    );
    debug!(args = ?args, "compiler arguments");

    let output = Command::new(&self.tool).args(&args).output().await?;
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
      debug!(stderr = %stderr, "compiler stderr");
      return Err(CompileError::Tool {
        code: output.status.code(),
        stderr,
      });
    }

    Ok(())
  }
}
