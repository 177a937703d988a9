//! The invocation capability boundary.
//!
//! The driver validates the entry point against container metadata and then
//! hands off to a [`MethodRuntime`]. What "invoke" means is the runtime's
//! business: the stock [`VmRuntime`] shells out to the platform VM, tests
//! script the boundary, and the IDE plugs its interpreter in here. The
//! driver itself never touches a reflection API.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, info};

use super::context::ExecutionContext;
use crate::consts::VM_TOOL_ENV;
use crate::dex::MethodInfo;

/// A fully resolved, validated entry-point invocation.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
  /// Binary name of the resolved class.
  pub class_name: String,

  /// The validated `main` method.
  pub method: MethodInfo,

  /// Program arguments. The driver always passes an empty array.
  pub args: Vec<String>,

  /// Container files of the aggregate classpath, in load order.
  pub classpath: Vec<PathBuf>,
}

/// Invocation failures, split by whose fault they are.
#[derive(Debug, Error)]
pub enum InvokeError {
  /// The user program raised; the host must survive this.
  #[error("{message}")]
  UserCode { message: String },

  /// The runtime itself could not perform the invocation.
  #[error("runtime failure: {message}")]
  Runtime { message: String },
}

/// Capability to execute a validated entry point.
///
/// `invoke` runs on a blocking worker thread and may block freely; program
/// output goes through the context's writers, input comes from its source.
pub trait MethodRuntime: Send + Sync + 'static {
  fn invoke(&self, request: &InvokeRequest, ctx: &mut ExecutionContext) -> Result<(), InvokeError>;
}

/// Stock runtime shelling out to the platform VM (`dalvikvm`-compatible).
///
/// Child stdout/stderr are streamed into the run's output pipe. Interactive
/// stdin is not wired up for external processes; the child reads from the
/// null device.
#[derive(Debug, Clone)]
pub struct VmRuntime {
  tool: PathBuf,
}

impl VmRuntime {
  /// Tool resolved from the `DEXPIPE_VM` env var, falling back to
  /// `dalvikvm` on the search path.
  pub fn from_env() -> Self {
    let tool = std::env::var_os(VM_TOOL_ENV)
      .map(PathBuf::from)
      .unwrap_or_else(|| PathBuf::from("dalvikvm"));
    Self { tool }
  }

  pub fn with_tool(tool: PathBuf) -> Self {
    Self { tool }
  }
}

impl Default for VmRuntime {
  fn default() -> Self {
    Self::from_env()
  }
}

impl MethodRuntime for VmRuntime {
  fn invoke(&self, request: &InvokeRequest, ctx: &mut ExecutionContext) -> Result<(), InvokeError> {
    let classpath = std::env::join_paths(&request.classpath)
      .map_err(|e| InvokeError::Runtime {
        message: format!("bad classpath: {}", e),
      })?;

    info!(tool = %self.tool.display(), class = %request.class_name, "spawning vm");

    let mut child = Command::new(&self.tool)
      .arg("-cp")
      .arg(&classpath)
      .arg(&request.class_name)
      .args(&request.args)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|e| InvokeError::Runtime {
        message: format!("failed to spawn {}: {}", self.tool.display(), e),
      })?;

    let mut child_out = child.stdout.take().ok_or(InvokeError::Runtime {
      message: "child stdout unavailable".to_string(),
    })?;
    let mut child_err = child.stderr.take().ok_or(InvokeError::Runtime {
      message: "child stderr unavailable".to_string(),
    })?;

    let out = &mut ctx.out;
    let err = &mut ctx.err;
    std::thread::scope(|scope| {
      scope.spawn(move || {
        let mut buffer = [0u8; 8192];
        while let Ok(n) = child_out.read(&mut buffer) {
          if n == 0 {
            break;
          }
          out.write_bytes(&buffer[..n]);
        }
        out.flush_buffer();
      });
      scope.spawn(move || {
        let mut buffer = [0u8; 8192];
        while let Ok(n) = child_err.read(&mut buffer) {
          if n == 0 {
            break;
          }
          err.write_bytes(&buffer[..n]);
        }
        err.flush_buffer();
      });
    });

    let status = child.wait().map_err(|e| InvokeError::Runtime {
      message: format!("failed to wait for vm: {}", e),
    })?;
    debug!(status = %status, "vm exited");

    if status.success() {
      Ok(())
    } else {
      Err(InvokeError::UserCode {
        message: format!("process exited with {}", status),
      })
    }
  }
}
