//! Collects the project's public assets so the generator sees them in the asset graph.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::models::EmittedAsset;
use crate::project::PUBLIC_ASSET_DIR;

/// A public file and the name it takes inside the build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicAsset {
  /// File on disk.
  pub source: PathBuf,
  /// Output-relative name, e.g. `public/images/logo.png`.
  pub name: String,
}

/// Walk `public_dir` and list every non-hidden file in a stable order.
///
/// A missing directory is not an error; projects without public assets simply
/// contribute nothing.
pub fn collect_public_assets(public_dir: &Path) -> Result<Vec<PublicAsset>> {
  if !public_dir.is_dir() {
    return Ok(Vec::new());
  }

  let mut assets = Vec::new();
  let walker = WalkDir::new(public_dir)
    .follow_links(true)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|entry| {
      entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
    });

  for entry in walker {
    let entry =
      entry.with_context(|| format!("failed to walk {}", public_dir.display()))?;
    if !entry.file_type().is_file() {
      continue;
    }

    let relative = entry
      .path()
      .strip_prefix(public_dir)
      .with_context(|| format!("{} escaped {}", entry.path().display(), public_dir.display()))?;
    let relative = relative.to_string_lossy().replace('\\', "/");

    assets.push(PublicAsset {
      source: entry.path().to_path_buf(),
      name: format!("{PUBLIC_ASSET_DIR}/{relative}"),
    });
  }

  Ok(assets)
}

/// Copy collected assets into `output_dir` and describe them as emitted assets.
///
/// Public filenames carry no content hash, so each asset gets a content revision.
pub fn emit_public_assets(assets: &[PublicAsset], output_dir: &Path) -> Result<Vec<EmittedAsset>> {
  let mut emitted = Vec::with_capacity(assets.len());

  for asset in assets {
    let bytes = fs::read(&asset.source)
      .with_context(|| format!("failed to read {}", asset.source.display()))?;
    let destination = output_dir.join(&asset.name);
    if let Some(parent) = destination.parent() {
      fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&destination, &bytes)
      .with_context(|| format!("failed to write {}", destination.display()))?;

    emitted.push(EmittedAsset::revisioned(
      asset.name.clone(),
      content_revision(&bytes),
    ));
  }

  tracing::debug!("collected {} public assets", emitted.len());
  Ok(emitted)
}

/// Hex digest used as a cache-busting revision.
pub fn content_revision(bytes: &[u8]) -> String {
  hex::encode(blake3::hash(bytes).as_bytes())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn missing_public_dir_yields_nothing() -> Result<()> {
    let dir = tempdir()?;
    assert!(collect_public_assets(&dir.path().join("public"))?.is_empty());
    Ok(())
  }

  #[test]
  fn collects_nested_files_and_skips_hidden_entries() -> Result<()> {
    let dir = tempdir()?;
    let public = dir.path().join("public");
    fs::create_dir_all(public.join("icons"))?;
    fs::create_dir_all(public.join(".cache"))?;
    fs::write(public.join("image.jpg"), b"jpg")?;
    fs::write(public.join("icons/a.png"), b"png")?;
    fs::write(public.join(".DS_Store"), b"junk")?;
    fs::write(public.join(".cache/blob"), b"junk")?;

    let names: Vec<String> = collect_public_assets(&public)?
      .into_iter()
      .map(|asset| asset.name)
      .collect();
    assert_eq!(names, vec!["public/icons/a.png", "public/image.jpg"]);
    Ok(())
  }

  #[test]
  fn emits_copies_with_content_revisions() -> Result<()> {
    let dir = tempdir()?;
    let public = dir.path().join("public");
    let output = dir.path().join("out");
    fs::create_dir_all(&public)?;
    fs::write(public.join("image.jpg"), b"jpg")?;

    let assets = collect_public_assets(&public)?;
    let emitted = emit_public_assets(&assets, &output)?;

    assert_eq!(fs::read(output.join("public/image.jpg"))?, b"jpg");
    assert_eq!(emitted, vec![EmittedAsset::revisioned(
      "public/image.jpg",
      content_revision(b"jpg")
    )]);
    assert_eq!(content_revision(b"jpg").len(), 64);
    Ok(())
  }
}
