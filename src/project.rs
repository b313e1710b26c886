//! Directory layout and environment signals for one build invocation.

use std::env;
use std::path::{Component, Path, PathBuf};

use crate::config::OfflineOptions;

/// Environment variable switching the build into static export handling.
pub const EXPORT_ENV_VAR: &str = "OFFLINE_SW_EXPORT";
/// URL prefix the host serves build output from.
pub const DEFAULT_ASSET_PREFIX: &str = "/_next";
/// Project directory holding static public assets.
pub const PUBLIC_ASSET_DIR: &str = "public";
/// Directory under the build output root holding static build artifacts.
pub const STATIC_OUTPUT_DIR: &str = "static";
/// Worker filename used when `workboxOpts.swDest` is not set.
pub const DEFAULT_SW_FILE: &str = "service-worker.js";
/// Filename of the rendered registration bootstrap.
pub const COMPILED_REGISTER_FILE: &str = "register-sw-compiled.js";

const PLUGIN_DIR_NAME: &str = ".offline-sw";

/// Directories and signals shared by every hook of a single build.
#[derive(Debug, Clone)]
pub struct OfflineBuildContext {
  /// Root of the application being built.
  pub project_dir: PathBuf,
  /// Directory the plugin writes its own generated files into.
  pub plugin_dir: PathBuf,
  /// URL prefix build output is served from.
  pub asset_prefix: String,
  /// Whether the build is headed for a static export.
  pub export: bool,
}

impl OfflineBuildContext {
  /// Context for a server build of `project_dir`.
  pub fn new(project_dir: impl Into<PathBuf>) -> Self {
    let project_dir = project_dir.into();
    Self {
      plugin_dir: project_dir.join(PLUGIN_DIR_NAME),
      project_dir,
      asset_prefix: DEFAULT_ASSET_PREFIX.into(),
      export: false,
    }
  }

  /// Context whose export signal is read from [`EXPORT_ENV_VAR`].
  pub fn from_env(project_dir: impl Into<PathBuf>) -> Self {
    let export = env::var_os(EXPORT_ENV_VAR).is_some_and(|value| !value.is_empty());
    Self::new(project_dir).with_export(export)
  }

  /// Override the export signal.
  pub fn with_export(mut self, export: bool) -> Self {
    self.export = export;
    self
  }

  /// Override where plugin artifacts are written.
  pub fn with_plugin_dir(mut self, plugin_dir: impl Into<PathBuf>) -> Self {
    self.plugin_dir = plugin_dir.into();
    self
  }

  /// Directory containing the project's public assets.
  pub fn public_dir(&self) -> PathBuf {
    self.project_dir.join(PUBLIC_ASSET_DIR)
  }

  /// Fixed location of the rendered registration bootstrap.
  pub fn compiled_register_path(&self) -> PathBuf {
    self.plugin_dir.join(COMPILED_REGISTER_FILE)
  }

  /// Resolve a caller-supplied path against the project directory.
  pub fn resolve(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.project_dir.join(path)
    }
  }
}

/// Where the worker lives at build time, at serve time, and after export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceWorkerPaths {
  relative_dest: String,
  build_dest: String,
  asset_prefix: String,
}

impl ServiceWorkerPaths {
  /// Derive the worker paths from the caller options.
  pub fn new(options: &OfflineOptions, asset_prefix: &str) -> Self {
    let relative_dest = options
      .workbox_opts
      .sw_dest
      .as_deref()
      .map(normalize_relative)
      .filter(|dest| !dest.is_empty())
      .unwrap_or_else(|| DEFAULT_SW_FILE.to_string());
    let build_dest = format!("{STATIC_OUTPUT_DIR}/{relative_dest}");

    Self {
      relative_dest,
      build_dest,
      asset_prefix: asset_prefix.trim_end_matches('/').to_string(),
    }
  }

  /// Worker path relative to the static output root, e.g. `foobar/service-worker.js`.
  pub fn relative_dest(&self) -> &str {
    &self.relative_dest
  }

  /// Worker path relative to the build output root, e.g. `static/service-worker.js`.
  pub fn build_dest(&self) -> &str {
    &self.build_dest
  }

  /// URL the application registers the worker under.
  pub fn public_url(&self) -> String {
    format!("/{}", self.relative_dest)
  }

  /// URL the host actually serves the built worker from.
  pub fn served_url(&self) -> String {
    format!("{}/{}", self.asset_prefix, self.build_dest)
  }
}

/// Normalise a relative path into forward-slash form, resolving `.` and `..` and
/// dropping leading separators.
pub fn normalize_relative(path: &str) -> String {
  let unified = path.replace('\\', "/");
  let mut segments: Vec<String> = Vec::new();
  for component in Path::new(&unified).components() {
    match component {
      Component::Normal(segment) => segments.push(segment.to_string_lossy().into_owned()),
      Component::ParentDir => {
        segments.pop();
      }
      Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
    }
  }
  segments.join("/")
}

#[cfg(test)]
mod tests {
  use super::*;

  fn options_with_dest(dest: Option<&str>) -> OfflineOptions {
    let mut options = OfflineOptions::default();
    options.workbox_opts.sw_dest = dest.map(str::to_string);
    options
  }

  #[test]
  fn default_worker_paths() {
    let paths = ServiceWorkerPaths::new(&options_with_dest(None), DEFAULT_ASSET_PREFIX);
    assert_eq!(paths.relative_dest(), "service-worker.js");
    assert_eq!(paths.build_dest(), "static/service-worker.js");
    assert_eq!(paths.public_url(), "/service-worker.js");
    assert_eq!(paths.served_url(), "/_next/static/service-worker.js");
  }

  #[test]
  fn custom_sw_dest_is_nested_under_static_root() {
    let paths = ServiceWorkerPaths::new(
      &options_with_dest(Some("./foobar//service-worker.js")),
      "/_next/",
    );
    assert_eq!(paths.relative_dest(), "foobar/service-worker.js");
    assert_eq!(paths.build_dest(), "static/foobar/service-worker.js");
    assert_eq!(paths.public_url(), "/foobar/service-worker.js");
    assert_eq!(paths.served_url(), "/_next/static/foobar/service-worker.js");
  }

  #[test]
  fn normalises_parent_segments_and_separators() {
    assert_eq!(normalize_relative("a/../b/./c.js"), "b/c.js");
    assert_eq!(normalize_relative("/sw.js"), "sw.js");
    assert_eq!(normalize_relative("dir\\sw.js"), "dir/sw.js");
  }

  #[test]
  fn context_paths() {
    let context = OfflineBuildContext::new("/app").with_plugin_dir("/plugin");
    assert_eq!(context.public_dir(), PathBuf::from("/app/public"));
    assert_eq!(
      context.compiled_register_path(),
      PathBuf::from("/plugin/register-sw-compiled.js")
    );
    assert_eq!(context.resolve(Path::new("sw.js")), PathBuf::from("/app/sw.js"));
    assert!(!context.export);
  }
}
