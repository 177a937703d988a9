//! Multi-unit classpath aggregation.
//!
//! An aggregator merges independently produced containers into one ordered
//! classpath and exposes load-by-name resolution across all of them. Load
//! order determines precedence on duplicate class names (first-loaded
//! wins), matching delegation-based class loading.

mod types;

pub use types::*;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::consts::CONTAINER_EXTENSION;
use crate::dex::{self, DexFile};
use crate::project::ProjectLayout;
use crate::util::hash::{ContentHash, hash_bytes};

/// One registered container.
#[derive(Debug)]
pub struct LoadedUnit {
  path: PathBuf,
  hash: ContentHash,
  dex: DexFile,
}

impl LoadedUnit {
  pub fn path(&self) -> &Path {
    &self.path
  }
}

/// Ordered aggregate of loaded containers.
#[derive(Debug, Default)]
pub struct ClasspathAggregator {
  units: Vec<LoadedUnit>,
}

impl ClasspathAggregator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register one container file into the aggregate classpath.
  ///
  /// The file is marked read-only before it is parsed, so a running program
  /// cannot mutate a container that is already part of the classpath.
  /// Loading is idempotent per content: a container whose bytes are already
  /// registered is skipped without error.
  pub fn load_unit(&mut self, path: &Path) -> Result<(), LoadError> {
    let io_err = |source| LoadError::Io {
      path: path.to_path_buf(),
      source,
    };

    let mut permissions = fs::metadata(path).map_err(io_err)?.permissions();
    if !permissions.readonly() {
      permissions.set_readonly(true);
      fs::set_permissions(path, permissions).map_err(io_err)?;
    }

    let bytes = fs::read(path).map_err(io_err)?;
    let hash = hash_bytes(&bytes);
    if self.units.iter().any(|u| u.hash == hash) {
      debug!(path = %path.display(), "container already loaded, skipping");
      return Ok(());
    }

    let dex = dex::parse(&bytes).map_err(|source| LoadError::Malformed {
      path: path.to_path_buf(),
      source,
    })?;

    info!(path = %path.display(), classes = dex.classes.len(), "container loaded");
    self.units.push(LoadedUnit {
      path: path.to_path_buf(),
      hash,
      dex,
    });
    Ok(())
  }

  /// Load a project's containers: the primary container first, then every
  /// per-library container in the build output, in sorted scan order.
  pub fn load_project(&mut self, layout: &ProjectLayout) -> Result<(), LoadError> {
    let primary = layout.primary_container();
    if !primary.exists() {
      return Err(LoadError::MissingContainer(primary));
    }
    self.load_unit(&primary)?;

    let lib_out = layout.library_output_dir();
    if !lib_out.is_dir() {
      return Ok(());
    }
    let mut containers: Vec<PathBuf> = fs::read_dir(&lib_out)
      .map_err(|source| LoadError::Io {
        path: lib_out.clone(),
        source,
      })?
      .filter_map(|entry| entry.ok())
      .map(|entry| entry.path())
      .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(CONTAINER_EXTENSION))
      .collect();
    containers.sort();

    for container in containers {
      if let Err(e) = self.load_unit(&container) {
        // A broken library container should not take down the primary
        // classpath; resolution just won't see its classes.
        warn!(path = %container.display(), error = %e, "skipping library container");
      }
    }
    Ok(())
  }

  /// Resolve a class by binary name, searching units in load order.
  pub fn load_class(&self, binary_name: &str) -> Result<ClassHandle<'_>, LoadError> {
    for (index, unit) in self.units.iter().enumerate() {
      if let Some(class) = unit.dex.find_class(binary_name) {
        return Ok(ClassHandle::new(index, class));
      }
    }
    Err(LoadError::ClassNotFound(binary_name.to_string()))
  }

  /// All resolvable binary names, in container-scan order. Shadowed
  /// duplicates are omitted.
  pub fn class_names(&self) -> Vec<String> {
    let mut names = Vec::new();
    for unit in &self.units {
      for class in &unit.dex.classes {
        let name = class.binary_name();
        if !names.contains(&name) {
          names.push(name);
        }
      }
    }
    names
  }

  /// Entry-class selection: prefer the first class whose name ends in
  /// `Main`; otherwise the first class in scan order.
  pub fn select_entry_class(&self) -> Option<String> {
    let names = self.class_names();
    names
      .iter()
      .find(|n| n.ends_with("Main"))
      .or_else(|| names.first())
      .cloned()
  }

  /// Paths of all registered containers, in load order.
  pub fn unit_paths(&self) -> Vec<PathBuf> {
    self.units.iter().map(|u| u.path.clone()).collect()
  }

  pub fn is_empty(&self) -> bool {
    self.units.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  use crate::dex::{ACC_PUBLIC, ACC_STATIC, MAIN_DESCRIPTOR};
  use crate::util::testutil::{DexClassSpec, DexMethodSpec, build_dex};

  fn write_container(dir: &Path, name: &str, classes: &[DexClassSpec]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, build_dex(classes)).unwrap();
    path
  }

  #[test]
  fn resolves_classes_across_units() {
    let temp = tempdir().unwrap();
    let a = write_container(temp.path(), "a.dex", &[DexClassSpec::new("La/A;")]);
    let b = write_container(temp.path(), "b.dex", &[DexClassSpec::new("Lb/B;")]);

    let mut aggregator = ClasspathAggregator::new();
    aggregator.load_unit(&a).unwrap();
    aggregator.load_unit(&b).unwrap();

    assert!(aggregator.load_class("a.A").is_ok());
    assert!(aggregator.load_class("b.B").is_ok());
    assert!(matches!(
      aggregator.load_class("c.C"),
      Err(LoadError::ClassNotFound(name)) if name == "c.C"
    ));
  }

  #[test]
  fn first_loaded_unit_wins_on_name_collision() {
    let temp = tempdir().unwrap();
    let first = write_container(
      temp.path(),
      "first.dex",
      &[DexClassSpec::new("La/Dup;").with_method(DexMethodSpec::new(
        "main",
        &["[Ljava/lang/String;"],
        "V",
        ACC_PUBLIC | ACC_STATIC,
        true,
      ))],
    );
    let second = write_container(temp.path(), "second.dex", &[DexClassSpec::new("La/Dup;")]);

    let mut aggregator = ClasspathAggregator::new();
    aggregator.load_unit(&first).unwrap();
    aggregator.load_unit(&second).unwrap();

    let class = aggregator.load_class("a.Dup").unwrap();
    assert!(class.find_method("main", MAIN_DESCRIPTOR).is_some());
  }

  #[test]
  fn class_handle_lists_methods_in_declaration_order() {
    let temp = tempdir().unwrap();
    let path = write_container(
      temp.path(),
      "unit.dex",
      &[DexClassSpec::new("La/App;")
        .with_method(DexMethodSpec::new("<init>", &[], "V", ACC_PUBLIC, true))
        .with_method(DexMethodSpec::new("main", &["[Ljava/lang/String;"], "V", ACC_PUBLIC | ACC_STATIC, true))
        .with_method(DexMethodSpec::new("run", &[], "V", ACC_PUBLIC, false))],
    );

    let mut aggregator = ClasspathAggregator::new();
    aggregator.load_unit(&path).unwrap();

    let class = aggregator.load_class("a.App").unwrap();
    let names: Vec<&str> = class.list_methods().iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["<init>", "main", "run"]);
  }

  #[test]
  fn loading_same_file_twice_is_a_noop() {
    let temp = tempdir().unwrap();
    let path = write_container(temp.path(), "unit.dex", &[DexClassSpec::new("La/A;")]);

    let mut aggregator = ClasspathAggregator::new();
    aggregator.load_unit(&path).unwrap();
    aggregator.load_unit(&path).unwrap();

    assert_eq!(aggregator.class_names(), vec!["a.A"]);
    assert_eq!(aggregator.unit_paths().len(), 1);
  }

  #[test]
  fn load_unit_marks_file_read_only() {
    let temp = tempdir().unwrap();
    let path = write_container(temp.path(), "unit.dex", &[DexClassSpec::new("La/A;")]);

    let mut aggregator = ClasspathAggregator::new();
    aggregator.load_unit(&path).unwrap();

    assert!(fs::metadata(&path).unwrap().permissions().readonly());
  }

  #[test]
  fn malformed_container_is_a_load_error() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("broken.dex");
    fs::write(&path, b"not a container").unwrap();

    let mut aggregator = ClasspathAggregator::new();
    assert!(matches!(
      aggregator.load_unit(&path),
      Err(LoadError::Malformed { .. })
    ));
  }

  #[test]
  fn selection_prefers_main_suffixed_class() {
    let temp = tempdir().unwrap();
    let path = write_container(
      temp.path(),
      "unit.dex",
      &[DexClassSpec::new("La/B;"), DexClassSpec::new("La/Main;")],
    );

    let mut aggregator = ClasspathAggregator::new();
    aggregator.load_unit(&path).unwrap();

    assert_eq!(aggregator.select_entry_class().as_deref(), Some("a.Main"));
  }

  #[test]
  fn selection_falls_back_to_first_class_in_scan_order() {
    let temp = tempdir().unwrap();
    let path = write_container(
      temp.path(),
      "unit.dex",
      &[DexClassSpec::new("La/B;"), DexClassSpec::new("La/C;")],
    );

    let mut aggregator = ClasspathAggregator::new();
    aggregator.load_unit(&path).unwrap();

    assert_eq!(aggregator.select_entry_class().as_deref(), Some("a.B"));
  }

  #[test]
  fn load_project_reads_primary_then_sorted_library_containers() {
    let temp = tempdir().unwrap();
    let layout = ProjectLayout::conventional(temp.path());
    fs::create_dir_all(layout.bin_dir.as_path()).unwrap();
    fs::create_dir_all(layout.library_output_dir()).unwrap();

    fs::write(
      layout.primary_container(),
      build_dex(&[DexClassSpec::new("Lapp/Main;")]),
    )
    .unwrap();
    write_container(
      &layout.library_output_dir(),
      "zeta.dex",
      &[DexClassSpec::new("Lzeta/Z;")],
    );
    write_container(
      &layout.library_output_dir(),
      "alpha.dex",
      &[DexClassSpec::new("Lalpha/A;")],
    );

    let mut aggregator = ClasspathAggregator::new();
    aggregator.load_project(&layout).unwrap();

    assert_eq!(aggregator.class_names(), vec!["app.Main", "alpha.A", "zeta.Z"]);
  }

  #[test]
  fn load_project_without_primary_container_fails() {
    let temp = tempdir().unwrap();
    let layout = ProjectLayout::conventional(temp.path());

    let mut aggregator = ClasspathAggregator::new();
    assert!(matches!(
      aggregator.load_project(&layout),
      Err(LoadError::MissingContainer(_))
    ));
  }
}
