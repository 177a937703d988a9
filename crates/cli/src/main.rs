use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use dexpipe_lib::cancel::CancelSignal;
use dexpipe_lib::classpath::ClasspathAggregator;
use dexpipe_lib::compile::{CompileTask, CompilerConfig, D8Compiler, LibraryStatus};
use dexpipe_lib::consts::DEFAULT_MIN_API;
use dexpipe_lib::exec::{ExecutionDriver, VmRuntime};
use dexpipe_lib::project::ProjectLayout;
use dexpipe_lib::report::BuildReporter;

mod output;

/// dexpipe - on-device DEX build & execution pipeline
#[derive(Parser)]
#[command(name = "dexpipe")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile a project's classes and library jars into containers
  Build {
    /// Project root directory
    #[arg(default_value = ".")]
    project: PathBuf,

    /// Platform library jar to compile against (repeatable)
    #[arg(long = "lib")]
    libs: Vec<PathBuf>,

    /// Minimum platform API level
    #[arg(long, default_value_t = DEFAULT_MIN_API)]
    min_api: u32,

    /// Compile without debug info
    #[arg(long)]
    release: bool,
  },

  /// Build a project, then resolve and invoke an entry point
  Run {
    /// Project root directory
    #[arg(default_value = ".")]
    project: PathBuf,

    /// Entry class; defaults to the selection policy
    #[arg(long)]
    class: Option<String>,

    /// Platform library jar to compile against (repeatable)
    #[arg(long = "lib")]
    libs: Vec<PathBuf>,

    /// Minimum platform API level
    #[arg(long, default_value_t = DEFAULT_MIN_API)]
    min_api: u32,

    /// Compile without debug info
    #[arg(long)]
    release: bool,
  },

  /// List the classes resolvable from a built project
  Classes {
    /// Project root directory
    #[arg(default_value = ".")]
    project: PathBuf,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::from_default_env()
  };
  tracing_subscriber::fmt().with_env_filter(filter).without_time().init();

  match cli.command {
    Commands::Build {
      project,
      libs,
      min_api,
      release,
    } => cmd_build(&project, libs, min_api, release).await,
    Commands::Run {
      project,
      class,
      libs,
      min_api,
      release,
    } => cmd_run(&project, class, libs, min_api, release).await,
    Commands::Classes { project } => cmd_classes(&project),
  }
}

fn compiler_config(libs: Vec<PathBuf>, min_api: u32, release: bool) -> CompilerConfig {
  CompilerConfig {
    min_api,
    debug: !release,
    system_classpath: libs,
    ..CompilerConfig::default()
  }
}

/// Run the compile task and wait for the library tasks; a batch caller has
/// nothing better to do with the handles.
async fn build_project(layout: &ProjectLayout, config: CompilerConfig) -> Result<BuildReporter> {
  let reporter = BuildReporter::new(Arc::new(output::render_report));

  let task = CompileTask::new(layout.clone(), config, D8Compiler::from_env());
  let mut outcome = task.execute(&reporter, &CancelSignal::new()).await;
  let builds = outcome.join_libraries().await;

  let built = builds
    .iter()
    .filter(|b| matches!(b.status, LibraryStatus::Built(_)))
    .count();
  let cached = builds
    .iter()
    .filter(|b| matches!(b.status, LibraryStatus::Cached(_)))
    .count();
  if !builds.is_empty() {
    eprintln!(
      "{} {} libraries ({} compiled, {} cached)",
      "::".cyan().bold(),
      builds.len(),
      built,
      cached
    );
  }

  Ok(reporter)
}

async fn cmd_build(project: &PathBuf, libs: Vec<PathBuf>, min_api: u32, release: bool) -> Result<()> {
  let layout = ProjectLayout::conventional(project);
  if !layout.root.is_dir() {
    bail!("project directory not found: {}", layout.root.display());
  }

  eprintln!("{} Building {}", "::".cyan().bold(), layout.root.display());
  let reporter = build_project(&layout, compiler_config(libs, min_api, release)).await?;

  if reporter.failed() {
    std::process::exit(1);
  }
  Ok(())
}

async fn cmd_run(
  project: &PathBuf,
  class: Option<String>,
  libs: Vec<PathBuf>,
  min_api: u32,
  release: bool,
) -> Result<()> {
  let layout = ProjectLayout::conventional(project);
  if !layout.root.is_dir() {
    bail!("project directory not found: {}", layout.root.display());
  }

  eprintln!("{} Building {}", "::".cyan().bold(), layout.root.display());
  let reporter = build_project(&layout, compiler_config(libs, min_api, release)).await?;
  if reporter.failed() {
    std::process::exit(1);
  }

  let mut aggregator = ClasspathAggregator::new();
  aggregator.load_project(&layout)?;
  tracing::debug!(containers = aggregator.unit_paths().len(), "classpath loaded");

  let class_name = match class.or_else(|| aggregator.select_entry_class()) {
    Some(name) => name,
    None => bail!("no classes found in the built containers"),
  };
  eprintln!("{} Running {}", "::".cyan().bold(), class_name.bold());

  let driver = ExecutionDriver::new(
    Arc::new(aggregator),
    VmRuntime::from_env(),
    Arc::new(output::render_stream),
  );
  if driver.run(&class_name, &CancelSignal::new()).await.is_err() {
    // The failure already reached the error stream.
    std::process::exit(1);
  }

  eprintln!("{} Done!", "::".green().bold());
  Ok(())
}

fn cmd_classes(project: &PathBuf) -> Result<()> {
  let layout = ProjectLayout::conventional(project);

  let mut aggregator = ClasspathAggregator::new();
  aggregator.load_project(&layout)?;

  for name in aggregator.class_names() {
    println!("{}", name);
  }
  Ok(())
}
