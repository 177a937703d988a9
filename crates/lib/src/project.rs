//! Project directory layout.
//!
//! A project is owned by the caller; the pipeline only reads its paths.
//! The layout mirrors the on-device convention: compiled class files under
//! `bin/classes`, the primary container at `bin/classes.dex`, library jars
//! under `libs/`, and per-library containers under `build/libs/`.

use std::path::{Path, PathBuf};

use crate::consts::{CLASSES_DIR, LIBRARY_OUTPUT_DIR, PRIMARY_CONTAINER};

/// Paths of a consumed project. Lifecycle is owned by the caller.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
  /// Project root directory.
  pub root: PathBuf,

  /// Binary-output directory (compiled classes, primary container).
  pub bin_dir: PathBuf,

  /// Directory of library jar inputs.
  pub lib_dir: PathBuf,

  /// Build directory (per-library container outputs).
  pub build_dir: PathBuf,
}

impl ProjectLayout {
  /// Layout with explicitly supplied directories.
  pub fn new(root: PathBuf, bin_dir: PathBuf, lib_dir: PathBuf, build_dir: PathBuf) -> Self {
    Self {
      root,
      bin_dir,
      lib_dir,
      build_dir,
    }
  }

  /// Conventional layout under a single root: `bin/`, `libs/`, `build/`.
  pub fn conventional(root: &Path) -> Self {
    Self {
      root: root.to_path_buf(),
      bin_dir: root.join("bin"),
      lib_dir: root.join("libs"),
      build_dir: root.join("build"),
    }
  }

  /// Directory of compiled class files consumed by the primary compile.
  pub fn classes_dir(&self) -> PathBuf {
    self.bin_dir.join(CLASSES_DIR)
  }

  /// Path of the primary container produced by the compile task.
  pub fn primary_container(&self) -> PathBuf {
    self.bin_dir.join(PRIMARY_CONTAINER)
  }

  /// Directory of per-library container outputs.
  pub fn library_output_dir(&self) -> PathBuf {
    self.build_dir.join(LIBRARY_OUTPUT_DIR)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn conventional_layout_derives_paths() {
    let layout = ProjectLayout::conventional(Path::new("/work/app"));
    assert_eq!(layout.classes_dir(), PathBuf::from("/work/app/bin/classes"));
    assert_eq!(layout.primary_container(), PathBuf::from("/work/app/bin/classes.dex"));
    assert_eq!(layout.library_output_dir(), PathBuf::from("/work/app/build/libs"));
  }

  #[test]
  fn explicit_layout_keeps_supplied_dirs() {
    let layout = ProjectLayout::new(
      PathBuf::from("/p"),
      PathBuf::from("/out"),
      PathBuf::from("/jars"),
      PathBuf::from("/scratch"),
    );
    assert_eq!(layout.classes_dir(), PathBuf::from("/out/classes"));
    assert_eq!(layout.library_output_dir(), PathBuf::from("/scratch/libs"));
  }
}
