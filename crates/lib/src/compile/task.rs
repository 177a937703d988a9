//! The compilation task.
//!
//! Orchestrates one build: collect compiled class files, produce the
//! primary container, then kick off per-library compilations as background
//! tasks. Every failure ends at a report call; the task never takes down
//! its caller.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::cache;
use super::compiler::{CompileRequest, DexCompiler};
use super::types::{CompileError, CompileOutcome, CompilerConfig, LibraryBuild, LibraryStatus};
use crate::cancel::CancelSignal;
use crate::consts::PRIMARY_CONTAINER;
use crate::project::ProjectLayout;
use crate::report::BuildReporter;
use crate::util::hash::hash_file;

/// Converts a project's compiled program units into containers.
pub struct CompileTask<C: DexCompiler> {
  layout: ProjectLayout,
  config: CompilerConfig,
  compiler: Arc<C>,
}

impl<C: DexCompiler> CompileTask<C> {
  pub fn new(layout: ProjectLayout, config: CompilerConfig, compiler: C) -> Self {
    Self {
      layout,
      config,
      compiler: Arc::new(compiler),
    }
  }

  /// Run the build.
  ///
  /// The primary container is compiled inline; library jars are handed to
  /// background tasks whose handles come back in the outcome. Library
  /// results are not folded into the primary result; each one reports its
  /// own errors through `reporter`.
  pub async fn execute(&self, reporter: &BuildReporter, cancel: &CancelSignal) -> CompileOutcome {
    if cancel.is_cancelled() {
      reporter.report_error("Build cancelled");
      return CompileOutcome {
        primary: None,
        library_tasks: JoinSet::new(),
      };
    }

    let primary = match self.compile_primary(reporter).await {
      Ok(path) => {
        reporter.report_success();
        path
      }
      Err(e) => {
        reporter.report_error(format!("Compilation failed: {}", e));
        None
      }
    };

    // Step 5/6: libraries, regardless of how the primary compile went.
    let library_tasks = self.spawn_library_compiles(reporter, cancel);

    CompileOutcome {
      primary,
      library_tasks,
    }
  }

  /// Compile all class files under the classes directory into the primary
  /// container.
  async fn compile_primary(&self, reporter: &BuildReporter) -> Result<Option<PathBuf>, CompileError> {
    let classes_dir = self.layout.classes_dir();
    if !classes_dir.is_dir() {
      return Err(CompileError::MissingClassesDir(classes_dir));
    }

    let mut class_files: Vec<PathBuf> = WalkDir::new(&classes_dir)
      .into_iter()
      .filter_map(|entry| entry.ok())
      .filter(|entry| entry.file_type().is_file())
      .map(|entry| entry.into_path())
      .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("class"))
      .collect();
    class_files.sort();

    reporter.report_logging(format!("Compiling {} class files", class_files.len()));

    // A previous run may have locked the container read-only when loading
    // it; replace it cleanly.
    remove_stale_container(&self.layout.primary_container())?;

    let had_inputs = !class_files.is_empty();
    let request = CompileRequest {
      inputs: class_files,
      classpath: self.config.system_classpath.clone(),
      min_api: self.config.min_api,
      debug: self.config.debug,
      output_dir: self.layout.bin_dir.clone(),
    };
    self.compiler.compile(request).await?;

    let primary = self.layout.primary_container();
    if primary.exists() {
      info!(container = %primary.display(), "primary container written");
      Ok(Some(primary))
    } else if had_inputs {
      Err(CompileError::MissingOutput(primary))
    } else {
      // Zero program files: the tool accepts this and produces nothing.
      debug!("no class files, no primary container produced");
      Ok(None)
    }
  }

  /// Start a background compile for every library jar that is not cached.
  ///
  /// A missing library directory skips the step entirely, without reports.
  fn spawn_library_compiles(&self, reporter: &BuildReporter, cancel: &CancelSignal) -> JoinSet<LibraryBuild> {
    let mut tasks = JoinSet::new();

    let lib_dir = &self.layout.lib_dir;
    if !lib_dir.is_dir() {
      debug!(dir = %lib_dir.display(), "no library directory, skipping library step");
      return tasks;
    }

    let mut jars: Vec<PathBuf> = match fs::read_dir(lib_dir) {
      Ok(entries) => entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jar"))
        .collect(),
      Err(e) => {
        reporter.report_error(format!("Failed to read library directory: {}", e));
        return tasks;
      }
    };
    jars.sort();
    if jars.is_empty() {
      return tasks;
    }

    let out_dir = self.layout.library_output_dir();
    if let Err(e) = fs::create_dir_all(&out_dir) {
      reporter.report_error(format!("Failed to create library output directory: {}", e));
      return tasks;
    }

    let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
    for jar in jars {
      tasks.spawn(compile_library(
        jar,
        out_dir.clone(),
        self.compiler.clone(),
        self.config.clone(),
        reporter.clone(),
        cancel.clone(),
        semaphore.clone(),
      ));
    }
    tasks
  }
}

/// Remove a container left behind by an earlier build, lifting the
/// read-only mark the loader puts on it.
fn remove_stale_container(path: &std::path::Path) -> std::io::Result<()> {
  if !path.exists() {
    return Ok(());
  }
  let mut permissions = fs::metadata(path)?.permissions();
  if permissions.readonly() {
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions)?;
  }
  fs::remove_file(path)
}

/// Compile one library jar into its own container, unless the cache already
/// holds a container built from identical jar content.
async fn compile_library<C: DexCompiler>(
  jar: PathBuf,
  out_dir: PathBuf,
  compiler: Arc<C>,
  config: CompilerConfig,
  reporter: BuildReporter,
  cancel: CancelSignal,
  semaphore: Arc<Semaphore>,
) -> LibraryBuild {
  let name = jar
    .file_name()
    .map(|n| n.to_string_lossy().to_string())
    .unwrap_or_else(|| jar.display().to_string());
  let done = |status| LibraryBuild {
    name: name.clone(),
    status,
  };

  let _permit = semaphore.acquire_owned().await.unwrap();

  if cancel.is_cancelled() {
    debug!(library = %name, "cancelled before start");
    return done(LibraryStatus::Skipped);
  }

  let stem = jar
    .file_stem()
    .map(|s| s.to_string_lossy().to_string())
    .unwrap_or_else(|| name.clone());
  let output = out_dir.join(format!("{}.dex", stem));

  let source_hash = match hash_file(&jar) {
    Ok(hash) => hash,
    Err(e) => {
      reporter.report_error(format!("Failed to read library {}: {}", name, e));
      return done(LibraryStatus::Failed);
    }
  };

  if cache::is_fresh(&output, &source_hash) {
    debug!(library = %name, container = %output.display(), "library container up to date");
    return done(LibraryStatus::Cached(output));
  }

  reporter.report_info(format!("Compiling library {}", name));

  // Stage into a temp dir so a failed compile never leaves a half-written
  // container under the cache's name.
  let staging = match tempfile::Builder::new().prefix(".stage-").tempdir_in(&out_dir) {
    Ok(dir) => dir,
    Err(e) => {
      reporter.report_error(format!("Failed to stage library {}: {}", name, e));
      return done(LibraryStatus::Failed);
    }
  };

  let request = CompileRequest {
    inputs: vec![jar.clone()],
    classpath: config.system_classpath.clone(),
    min_api: config.min_api,
    debug: config.debug,
    output_dir: staging.path().to_path_buf(),
  };
  if let Err(e) = compiler.compile(request).await {
    reporter.report_error(format!("Failed to compile library {}: {}", name, e));
    return done(LibraryStatus::Failed);
  }

  let produced = staging.path().join(PRIMARY_CONTAINER);
  if !produced.exists() {
    reporter.report_error(format!(
      "Failed to compile library {}: {}",
      name,
      CompileError::MissingOutput(produced)
    ));
    return done(LibraryStatus::Failed);
  }
  if let Err(e) = remove_stale_container(&output).and_then(|()| fs::rename(&produced, &output)) {
    reporter.report_error(format!("Failed to place library container {}: {}", name, e));
    return done(LibraryStatus::Failed);
  }

  if let Err(e) = cache::record(&output, &source_hash) {
    // Worst case the next build recompiles this jar.
    warn!(library = %name, error = %e, "failed to write cache stamp");
  }

  info!(library = %name, container = %output.display(), "library compiled");
  done(LibraryStatus::Built(output))
}
