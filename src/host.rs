//! Model of the host bundler surface the offline pipeline plugs into.
//!
//! The host owns scheduling: it resolves the entry provider and runs the plugin
//! values pushed into [`BundlerConfig::plugins`] against its [`Compilation`].

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::assets::{collect_public_assets, emit_public_assets};
use crate::entry::EntryProvider;
use crate::error::OfflineError;
use crate::generator::{GenerateSwOptions, InjectManifestOptions, PrecacheGenerator};
use crate::models::EmittedAsset;

/// Lowest host version exposing the hook surface this crate relies on.
pub const MINIMUM_HOST_VERSION: &str = "5.0.0";

/// Per-compilation options the host passes to the bundler hook.
#[derive(Debug, Clone, Default)]
pub struct BundlerOptions {
  /// Development build.
  pub dev: bool,
  /// Server-side compilation (as opposed to the client bundle).
  pub is_server: bool,
  /// Whether the host exposes its default loaders; absent on unsupported hosts.
  pub default_loaders: bool,
  /// Build identifier assigned by the host.
  pub build_id: String,
}

impl BundlerOptions {
  /// Options of a supported host for a client production compilation.
  pub fn client() -> Self {
    Self {
      default_loaders: true,
      ..Self::default()
    }
  }

  /// Options of a supported host for a server production compilation.
  pub fn server() -> Self {
    Self {
      is_server: true,
      ..Self::client()
    }
  }

  /// Fail when the host lacks the hook surface.
  pub fn ensure_compatible(&self) -> Result<(), OfflineError> {
    if self.default_loaders {
      Ok(())
    } else {
      Err(OfflineError::IncompatibleHost {
        minimum: MINIMUM_HOST_VERSION,
        reason: "bundler options do not expose default loaders".into(),
      })
    }
  }
}

/// The mutable part of the host configuration seen by the bundler hook.
pub struct BundlerConfig {
  /// Deferred entry-point provider.
  pub entry: EntryProvider,
  /// Plugins the host runs after compiling.
  pub plugins: Vec<BundlerPlugin>,
}

impl BundlerConfig {
  /// Configuration with the given entry provider and no plugins.
  pub fn new(entry: EntryProvider) -> Self {
    Self {
      entry,
      plugins: Vec::new(),
    }
  }
}

/// Where a copied file comes from.
#[derive(Debug, Clone)]
pub enum CopySource {
  /// A file on disk.
  File(PathBuf),
  /// Content bundled with this crate.
  Inline(&'static str),
}

/// Work the host performs on behalf of the offline pipeline.
#[derive(Debug, Clone)]
pub enum BundlerPlugin {
  /// Copy a single file into the output directory.
  CopyFile {
    /// File to copy.
    from: CopySource,
    /// Output-relative destination.
    to: String,
  },
  /// Copy the project's public assets into the asset graph.
  CollectPublicAssets {
    /// Directory to collect from.
    public_dir: PathBuf,
  },
  /// Generate a complete worker with an embedded pre-cache manifest.
  GenerateSw(GenerateSwOptions),
  /// Inject the pre-cache manifest into an existing worker source.
  InjectManifest(InjectManifestOptions),
}

impl BundlerPlugin {
  /// Run the plugin against a compilation.
  pub fn apply(
    &self,
    compilation: &mut Compilation,
    generator: &dyn PrecacheGenerator,
  ) -> Result<()> {
    match self {
      Self::CopyFile { from, to } => {
        let destination = compilation.output_dir.join(to);
        if let Some(parent) = destination.parent() {
          fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        match from {
          CopySource::File(source) => {
            fs::copy(source, &destination).with_context(|| {
              format!(
                "failed to copy {} to {}",
                source.display(),
                destination.display()
              )
            })?;
          }
          CopySource::Inline(content) => {
            fs::write(&destination, content)
              .with_context(|| format!("failed to write {}", destination.display()))?;
          }
        }
        Ok(())
      }
      Self::CollectPublicAssets { public_dir } => {
        let assets = collect_public_assets(public_dir)?;
        let emitted = emit_public_assets(&assets, &compilation.output_dir)?;
        compilation.assets.extend(emitted);
        Ok(())
      }
      Self::GenerateSw(options) => generator.generate_sw(compilation, options).map(|_| ()),
      Self::InjectManifest(options) => generator.inject_manifest(compilation, options).map(|_| ()),
    }
  }
}

/// Output of one client compilation: where it is written and what it emitted.
#[derive(Debug, Clone)]
pub struct Compilation {
  /// Build output root.
  pub output_dir: PathBuf,
  /// Public path prefix joined with asset names to form URLs.
  pub public_path: String,
  /// Assets known to the host's asset graph.
  pub assets: Vec<EmittedAsset>,
}

impl Compilation {
  /// Empty compilation writing into `output_dir`.
  pub fn new(output_dir: impl Into<PathBuf>, public_path: impl Into<String>) -> Self {
    Self {
      output_dir: output_dir.into(),
      public_path: public_path.into(),
      assets: Vec::new(),
    }
  }

  /// Register an emitted asset.
  pub fn emit(&mut self, asset: EmittedAsset) {
    self.assets.push(asset);
  }

  /// Rebuild the asset graph from files already present under `output_dir/subdir`.
  pub fn scan(
    output_dir: impl Into<PathBuf>,
    public_path: impl Into<String>,
    subdir: &Path,
  ) -> Result<Self> {
    let mut compilation = Self::new(output_dir, public_path);
    let root = compilation.output_dir.join(subdir);
    if !root.is_dir() {
      return Ok(compilation);
    }

    for entry in WalkDir::new(&root).sort_by_file_name() {
      let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
      if !entry.file_type().is_file() {
        continue;
      }
      let relative = entry
        .path()
        .strip_prefix(&compilation.output_dir)
        .with_context(|| format!("{} escaped the output directory", entry.path().display()))?;
      compilation.emit(EmittedAsset::hashed(
        relative.to_string_lossy().replace('\\', "/"),
      ));
    }

    Ok(compilation)
  }

  /// Run plugins in order.
  pub fn run_plugins(
    &mut self,
    plugins: &[BundlerPlugin],
    generator: &dyn PrecacheGenerator,
  ) -> Result<()> {
    for plugin in plugins {
      plugin.apply(self, generator)?;
    }
    Ok(())
  }
}
