//! Static export support: move the built worker into the export output directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use same_file::is_same_file;

use crate::BuildResult;
use crate::project::ServiceWorkerPaths;

/// Copy `<dist_dir>/static/<sw>` to `<out_dir>/<sw>` byte for byte.
///
/// Returns the destination path.
pub fn copy_worker_to_export(
  dist_dir: &Path,
  out_dir: &Path,
  paths: &ServiceWorkerPaths,
) -> BuildResult<PathBuf> {
  let source = dist_dir.join(paths.build_dest());
  let destination = out_dir.join(paths.relative_dest());

  if let Some(parent) = destination.parent() {
    fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }

  if destination.exists()
    && is_same_file(&source, &destination)
      .with_context(|| format!("failed to compare {}", source.display()))?
  {
    return Ok(destination);
  }

  fs::copy(&source, &destination).with_context(|| {
    format!(
      "failed to copy service worker {} to {}",
      source.display(),
      destination.display()
    )
  })?;
  tracing::info!("copied service worker into export at {}", destination.display());

  Ok(destination)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::OfflineOptions;
  use crate::project::DEFAULT_ASSET_PREFIX;
  use tempfile::tempdir;

  #[test]
  fn copies_worker_byte_for_byte() -> BuildResult<()> {
    let dir = tempdir()?;
    let dist = dir.path().join(".next");
    let out = dir.path().join("out");
    let mut options = OfflineOptions::default();
    options.workbox_opts.sw_dest = Some("foobar/service-worker.js".into());
    let paths = ServiceWorkerPaths::new(&options, DEFAULT_ASSET_PREFIX);

    fs::create_dir_all(dist.join("static/foobar"))?;
    let bytes = b"self.addEventListener('install', () => {});\n\xff";
    fs::write(dist.join("static/foobar/service-worker.js"), bytes)?;

    let destination = copy_worker_to_export(&dist, &out, &paths)?;
    assert_eq!(destination, out.join("foobar/service-worker.js"));
    assert_eq!(fs::read(destination)?, bytes);
    Ok(())
  }

  #[test]
  fn missing_worker_propagates_error() {
    let dir = tempdir().unwrap();
    let paths = ServiceWorkerPaths::new(&OfflineOptions::default(), DEFAULT_ASSET_PREFIX);
    let result = copy_worker_to_export(&dir.path().join("dist"), &dir.path().join("out"), &paths);
    assert!(result.is_err());
  }
}
