//! Types for the compilation task.

use std::path::PathBuf;

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::error;

use crate::consts::DEFAULT_MIN_API;

/// Errors that can occur while producing a container.
///
/// None of these terminate the pipeline: the task reports them and carries
/// on with whatever work remains.
#[derive(Debug, Error)]
pub enum CompileError {
  /// The external compiler exited unsuccessfully.
  #[error("dex tool exited with status {code:?}: {stderr}")]
  Tool { code: Option<i32>, stderr: String },

  /// The project has no compiled-classes directory.
  #[error("classes directory not found: {0}")]
  MissingClassesDir(PathBuf),

  /// The tool reported success but the expected container is absent.
  #[error("expected container was not produced: {0}")]
  MissingOutput(PathBuf),

  /// I/O failure while collecting inputs or staging outputs.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Settings for container compilation.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
  /// Minimum platform API level passed to the compiler.
  pub min_api: u32,

  /// Compile with debug info (vs release).
  pub debug: bool,

  /// Platform library jars resolved against during compilation.
  pub system_classpath: Vec<PathBuf>,

  /// Maximum number of library compilations running at once.
  pub parallelism: usize,
}

impl Default for CompilerConfig {
  fn default() -> Self {
    Self {
      min_api: DEFAULT_MIN_API,
      debug: true,
      system_classpath: Vec::new(),
      parallelism: num_cpus(),
    }
  }
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

/// How a single library compilation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryStatus {
  /// Freshly compiled into the given container.
  Built(PathBuf),

  /// Source jar unchanged; the cached container was kept.
  Cached(PathBuf),

  /// Skipped because cancellation was requested before it started.
  Skipped,

  /// Compilation failed; the error was already reported.
  Failed,
}

/// Outcome of one library compilation task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryBuild {
  /// Jar file name, e.g. `foo.jar`.
  pub name: String,

  pub status: LibraryStatus,
}

/// Result of running the compile task.
///
/// Library compilations are fire-and-forget: they report their own errors
/// and their success is not folded into the primary result. The handles are
/// still exposed here so a caller can await or drop them instead of
/// orphaning the work.
pub struct CompileOutcome {
  /// Path of the produced primary container. `None` when the primary
  /// compile failed (already reported) or had no classes to compile.
  pub primary: Option<PathBuf>,

  /// In-flight library compilations.
  pub library_tasks: JoinSet<LibraryBuild>,
}

impl CompileOutcome {
  /// Await all library compilations. Panicked tasks are logged and skipped.
  pub async fn join_libraries(&mut self) -> Vec<LibraryBuild> {
    let mut builds = Vec::new();
    while let Some(joined) = self.library_tasks.join_next().await {
      match joined {
        Ok(build) => builds.push(build),
        Err(e) => error!(error = %e, "library compilation task panicked"),
      }
    }
    builds
  }
}
