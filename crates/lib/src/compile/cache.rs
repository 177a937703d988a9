//! Content-hash cache for per-library container outputs.
//!
//! Each library container carries a sidecar file recording the SHA-256 of
//! the jar it was compiled from. A cache hit requires both the container
//! and a sidecar whose hash matches the jar's current content, so a library
//! upgrade that keeps the same file name is still rebuilt.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::util::hash::ContentHash;

#[derive(Debug, Serialize, Deserialize)]
struct SourceStamp {
  source_hash: String,
}

/// Sidecar path for a container output: `foo.dex` -> `foo.dex.src.json`.
pub fn sidecar_path(output: &Path) -> PathBuf {
  let mut name = output.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  name.push(".src.json");
  output.with_file_name(name)
}

/// True when `output` exists and was compiled from a source with this hash.
pub fn is_fresh(output: &Path, source_hash: &ContentHash) -> bool {
  if !output.exists() {
    return false;
  }
  let stamp = match fs::read_to_string(sidecar_path(output)) {
    Ok(contents) => contents,
    Err(_) => return false,
  };
  match serde_json::from_str::<SourceStamp>(&stamp) {
    Ok(stamp) => stamp.source_hash == source_hash.0,
    Err(e) => {
      debug!(output = %output.display(), error = %e, "unreadable cache stamp");
      false
    }
  }
}

/// Record the source hash a container was compiled from.
pub fn record(output: &Path, source_hash: &ContentHash) -> std::io::Result<()> {
  let stamp = SourceStamp {
    source_hash: source_hash.0.clone(),
  };
  let json = serde_json::to_string(&stamp).map_err(std::io::Error::other)?;
  fs::write(sidecar_path(output), json)
}
