//! Seam to the service-worker generation subsystem, plus a reference generator.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::WorkboxOptions;
use crate::error::OfflineError;
use crate::host::Compilation;
use crate::models::AssetManifestEntry;
use crate::precache::{PrecacheBlacklist, UrlRewriter, filter_manifest};
use crate::template::{GENERATED_WORKER_TEMPLATE, render_template, write_if_changed};

/// Marker replaced by the manifest when injecting into an existing worker.
pub const INJECTION_POINT: &str = "self.__WB_MANIFEST";

const RUNTIME_TEMPLATE: &str = include_str!("../assets/sw-runtime.js");
const RUNTIME_FILE: &str = "sw-runtime.js";

/// Strategy a runtime caching route uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum CacheHandler {
  /// Try the network, fall back to the cache.
  NetworkFirst,
  /// Serve from cache, fall back to the network.
  CacheFirst,
  /// Serve from cache and refresh in the background.
  StaleWhileRevalidate,
  /// Network only.
  NetworkOnly,
  /// Cache only.
  CacheOnly,
}

/// Cache expiration limits for a runtime route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheExpiration {
  /// Maximum number of cached responses.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_entries: Option<u32>,
  /// Maximum age of a cached response.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_age_seconds: Option<u64>,
}

/// Options attached to a runtime caching route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeCachingOptions {
  /// Cache the route writes to.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cache_name: Option<String>,
  /// Expiration limits.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expiration: Option<CacheExpiration>,
}

/// A runtime caching route of the generated worker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeCaching {
  /// Regular expression source matched against request URLs.
  pub url_pattern: String,
  /// Caching strategy.
  pub handler: CacheHandler,
  /// Route options.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<RuntimeCachingOptions>,
}

fn default_runtime_caching() -> Vec<RuntimeCaching> {
  vec![RuntimeCaching {
    url_pattern: "^https?.*".into(),
    handler: CacheHandler::NetworkFirst,
    options: Some(RuntimeCachingOptions {
      cache_name: Some("offlineCache".into()),
      expiration: Some(CacheExpiration {
        max_entries: Some(200),
        max_age_seconds: None,
      }),
    }),
  }]
}

/// Post-processing step applied to the prepared manifest.
#[derive(Debug, Clone)]
pub enum ManifestTransform {
  /// Drop entries excluded by the blacklist, independently of the `exclude` option.
  ExcludeBlacklisted(PrecacheBlacklist),
}

impl ManifestTransform {
  /// Run the transform.
  pub fn apply(&self, manifest: Vec<AssetManifestEntry>) -> Vec<AssetManifestEntry> {
    match self {
      Self::ExcludeBlacklisted(blacklist) => filter_manifest(manifest, blacklist),
    }
  }
}

/// How the compilation's assets become a pre-cache manifest.
#[derive(Debug, Clone)]
pub struct ManifestSettings {
  /// Rules tested against asset names before URLs are formed.
  pub exclude: PrecacheBlacklist,
  /// Prefix rewrites applied to every URL.
  pub modify_url_prefix: UrlRewriter,
  /// Transforms run last, in order.
  pub manifest_transforms: Vec<ManifestTransform>,
}

impl Default for ManifestSettings {
  fn default() -> Self {
    Self {
      exclude: PrecacheBlacklist::default(),
      modify_url_prefix: UrlRewriter::default(),
      manifest_transforms: vec![ManifestTransform::ExcludeBlacklisted(
        PrecacheBlacklist::default(),
      )],
    }
  }
}

impl ManifestSettings {
  fn from_workbox(workbox: &WorkboxOptions) -> Self {
    let mut settings = Self::default();
    if let Some(exclude) = &workbox.exclude {
      settings.exclude = PrecacheBlacklist::new(exclude.clone());
    }
    if let Some(prefixes) = &workbox.modify_url_prefix {
      settings.modify_url_prefix = UrlRewriter::from_prefix_map(prefixes);
    }
    settings
  }
}

/// Options for full worker generation.
#[derive(Debug, Clone)]
pub struct GenerateSwOptions {
  /// Worker destination relative to the compilation output directory.
  pub sw_dest: String,
  /// Manifest preparation.
  pub manifest: ManifestSettings,
  /// Inline the runtime into the worker instead of importing a sibling script.
  pub inline_workbox_runtime: bool,
  /// Runtime caching routes.
  pub runtime_caching: Vec<RuntimeCaching>,
  /// Caller keys this generator does not interpret.
  pub extra: Map<String, Value>,
}

impl GenerateSwOptions {
  /// Plugin defaults for a worker written to `sw_dest`.
  pub fn defaults(sw_dest: impl Into<String>) -> Self {
    Self {
      sw_dest: sw_dest.into(),
      manifest: ManifestSettings::default(),
      inline_workbox_runtime: true,
      runtime_caching: default_runtime_caching(),
      extra: Map::new(),
    }
  }

  /// Defaults overridden by caller options. `sw_dest` always wins over the caller's
  /// `swDest`, which has already been folded into it.
  pub fn from_workbox(workbox: &WorkboxOptions, sw_dest: impl Into<String>) -> Self {
    let mut options = Self::defaults(sw_dest);
    options.manifest = ManifestSettings::from_workbox(workbox);
    if let Some(inline) = workbox.inline_workbox_runtime {
      options.inline_workbox_runtime = inline;
    }
    if let Some(runtime_caching) = &workbox.runtime_caching {
      options.runtime_caching = runtime_caching.clone();
    }
    options.extra = workbox.extra.clone();
    options
  }
}

/// Options for injecting the manifest into an existing worker.
#[derive(Debug, Clone)]
pub struct InjectManifestOptions {
  /// Worker source containing [`INJECTION_POINT`].
  pub sw_src: Option<PathBuf>,
  /// Worker destination relative to the compilation output directory.
  pub sw_dest: String,
  /// Manifest preparation.
  pub manifest: ManifestSettings,
  /// Caller keys this generator does not interpret.
  pub extra: Map<String, Value>,
}

impl InjectManifestOptions {
  /// Defaults overridden by caller options.
  pub fn from_workbox(workbox: &WorkboxOptions, sw_dest: impl Into<String>) -> Self {
    Self {
      sw_src: workbox.sw_src.clone(),
      sw_dest: sw_dest.into(),
      manifest: ManifestSettings::from_workbox(workbox),
      extra: workbox.extra.clone(),
    }
  }
}

/// Produces the worker file from a compilation's asset graph.
pub trait PrecacheGenerator {
  /// Write a complete worker; returns its path.
  fn generate_sw(&self, compilation: &Compilation, options: &GenerateSwOptions) -> Result<PathBuf>;

  /// Inject the manifest into `sw_src` and write it to `sw_dest`; returns its path.
  fn inject_manifest(
    &self,
    compilation: &Compilation,
    options: &InjectManifestOptions,
  ) -> Result<PathBuf>;
}

/// Build the pre-cache manifest for a compilation.
///
/// Order: drop excluded asset names (and the worker itself), join URLs, rewrite
/// prefixes, run transforms.
pub fn prepare_manifest(
  compilation: &Compilation,
  settings: &ManifestSettings,
  sw_dest: &str,
) -> Vec<AssetManifestEntry> {
  let entries = compilation
    .assets
    .iter()
    .filter(|asset| asset.name != sw_dest && !settings.exclude.is_excluded(&asset.name))
    .map(|asset| asset.to_manifest_entry(&compilation.public_path))
    .collect();

  let entries = settings.modify_url_prefix.rewrite_entries(entries);
  settings
    .manifest_transforms
    .iter()
    .fold(entries, |manifest, transform| transform.apply(manifest))
}

/// Reference generator writing a small self-contained worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerGenerator;

impl PrecacheGenerator for WorkerGenerator {
  fn generate_sw(&self, compilation: &Compilation, options: &GenerateSwOptions) -> Result<PathBuf> {
    let manifest = prepare_manifest(compilation, &options.manifest, &options.sw_dest);
    let destination = compilation.output_dir.join(&options.sw_dest);

    let runtime = if options.inline_workbox_runtime {
      RUNTIME_TEMPLATE.to_string()
    } else {
      let runtime_path = sibling_path(&destination, RUNTIME_FILE);
      write_if_changed(&runtime_path, RUNTIME_TEMPLATE)?;
      format!("importScripts('./{RUNTIME_FILE}');\n")
    };

    let manifest_json = serde_json::to_string_pretty(&manifest)?;
    let runtime_caching_json = serde_json::to_string_pretty(&options.runtime_caching)?;
    let worker = render_template(GENERATED_WORKER_TEMPLATE, &[
      ("PRECACHE_MANIFEST", manifest_json.as_str()),
      ("RUNTIME_CACHING", runtime_caching_json.as_str()),
      ("RUNTIME", runtime.as_str()),
    ]);

    write_if_changed(&destination, &worker)?;
    tracing::info!(
      "generated service worker at {} with {} pre-cache entries",
      destination.display(),
      manifest.len()
    );
    Ok(destination)
  }

  fn inject_manifest(
    &self,
    compilation: &Compilation,
    options: &InjectManifestOptions,
  ) -> Result<PathBuf> {
    let source_path = options.sw_src.as_ref().ok_or(OfflineError::MissingWorkerSource)?;
    let source = fs::read_to_string(source_path)
      .with_context(|| format!("failed to read worker source {}", source_path.display()))?;
    if !source.contains(INJECTION_POINT) {
      return Err(
        OfflineError::MissingInjectionPoint {
          path: source_path.clone(),
          marker: INJECTION_POINT,
        }
        .into(),
      );
    }

    let manifest = prepare_manifest(compilation, &options.manifest, &options.sw_dest);
    let manifest_json = serde_json::to_string(&manifest)?;
    let worker = source.replacen(INJECTION_POINT, &manifest_json, 1);

    let destination = compilation.output_dir.join(&options.sw_dest);
    write_if_changed(&destination, &worker)?;
    tracing::info!(
      "injected {} pre-cache entries into {}",
      manifest.len(),
      destination.display()
    );
    Ok(destination)
  }
}

fn sibling_path(path: &Path, file_name: &str) -> PathBuf {
  path
    .parent()
    .map(|parent| parent.join(file_name))
    .unwrap_or_else(|| PathBuf::from(file_name))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::EmittedAsset;
  use crate::precache::BlacklistRule;
  use tempfile::tempdir;

  fn compilation(output_dir: &Path) -> Compilation {
    let mut compilation = Compilation::new(output_dir, "/_next/");
    compilation.emit(EmittedAsset::hashed("static/chunks/main-abc.js"));
    compilation.emit(EmittedAsset::hashed("/static/chunks/webpack-def.js"));
    compilation.emit(EmittedAsset::hashed("static/chunks/main-abc.js.map"));
    compilation.emit(EmittedAsset::hashed("build-manifest.json"));
    compilation.emit(EmittedAsset::hashed("static/BUILD/_buildManifest.js"));
    compilation.emit(EmittedAsset::revisioned("public/image.jpg", "r1"));
    compilation
  }

  #[test]
  fn prepared_manifest_is_filtered_and_rewritten() {
    let dir = tempdir().unwrap();
    let manifest = prepare_manifest(
      &compilation(dir.path()),
      &ManifestSettings::default(),
      "static/service-worker.js",
    );

    assert_eq!(manifest, vec![
      AssetManifestEntry::new("/_next/static/chunks/main-abc.js", None),
      AssetManifestEntry::new("/_next/static/chunks/webpack-def.js", None),
      AssetManifestEntry::new("/image.jpg", Some("r1".into())),
    ]);
  }

  #[test]
  fn transform_filter_applies_when_exclude_is_replaced() {
    let dir = tempdir().unwrap();
    let workbox = WorkboxOptions {
      exclude: Some(vec![BlacklistRule::Suffix("image.jpg".into())]),
      ..WorkboxOptions::default()
    };
    let settings = ManifestSettings::from_workbox(&workbox);
    let manifest =
      prepare_manifest(&compilation(dir.path()), &settings, "static/service-worker.js");

    let urls: Vec<&str> = manifest.iter().map(|entry| entry.url.as_str()).collect();
    assert_eq!(urls, vec![
      "/_next/static/chunks/main-abc.js",
      "/_next/static/chunks/webpack-def.js",
    ]);
  }

  #[test]
  fn caller_prefix_map_never_leaves_double_or_relative_urls() {
    let dir = tempdir().unwrap();
    let urls = |prefixes: &str| -> Vec<String> {
      let workbox: WorkboxOptions =
        serde_json::from_str(&format!(r#"{{ "modifyURLPrefix": {prefixes} }}"#)).unwrap();
      let settings = ManifestSettings::from_workbox(&workbox);
      prepare_manifest(&compilation(dir.path()), &settings, "static/service-worker.js")
        .into_iter()
        .map(|entry| entry.url)
        .collect()
    };

    assert_eq!(urls(r#"{ "/_next/public/": "" }"#), vec![
      "/_next/static/chunks/main-abc.js",
      "/_next/static/chunks/webpack-def.js",
      "/image.jpg",
    ]);
    assert_eq!(urls(r#"{ "/_next": "/cdn" }"#), vec![
      "/cdn/static/chunks/main-abc.js",
      "/cdn/static/chunks/webpack-def.js",
      "/cdn/public/image.jpg",
    ]);
  }

  #[test]
  fn caller_options_override_defaults() {
    let workbox: WorkboxOptions = serde_json::from_str(
      r#"{
        "swDest": "ignored.js",
        "inlineWorkboxRuntime": false,
        "runtimeCaching": [{ "urlPattern": "^/api/", "handler": "CacheFirst" }],
        "skipWaiting": true
      }"#,
    )
    .unwrap();

    let options = GenerateSwOptions::from_workbox(&workbox, "static/service-worker.js");
    assert_eq!(options.sw_dest, "static/service-worker.js");
    assert!(!options.inline_workbox_runtime);
    assert_eq!(options.runtime_caching[0].handler, CacheHandler::CacheFirst);
    assert_eq!(options.extra.get("skipWaiting"), Some(&Value::Bool(true)));

    let defaults = GenerateSwOptions::defaults("static/service-worker.js");
    assert!(defaults.inline_workbox_runtime);
    assert_eq!(defaults.runtime_caching, default_runtime_caching());
  }

  #[test]
  fn generates_worker_with_embedded_manifest() -> Result<()> {
    let dir = tempdir()?;
    let path = WorkerGenerator.generate_sw(
      &compilation(dir.path()),
      &GenerateSwOptions::defaults("static/service-worker.js"),
    )?;

    let worker = fs::read_to_string(&path)?;
    assert_eq!(path, dir.path().join("static/service-worker.js"));
    assert!(worker.contains("/_next/static/chunks/main-abc.js"));
    assert!(worker.contains("\"offlineCache\""));
    assert!(worker.contains("addEventListener('install'"));
    assert!(!worker.contains("build-manifest.json"));
    assert!(!worker.contains("{PRECACHE_MANIFEST}"));
    Ok(())
  }

  #[test]
  fn non_inline_runtime_is_imported() -> Result<()> {
    let dir = tempdir()?;
    let mut options = GenerateSwOptions::defaults("static/service-worker.js");
    options.inline_workbox_runtime = false;
    WorkerGenerator.generate_sw(&compilation(dir.path()), &options)?;

    let worker = fs::read_to_string(dir.path().join("static/service-worker.js"))?;
    assert!(worker.contains("importScripts('./sw-runtime.js')"));
    assert!(dir.path().join("static/sw-runtime.js").exists());
    Ok(())
  }

  #[test]
  fn injects_manifest_into_worker_source() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("sw.js");
    fs::write(&source, "precacheAndRoute(self.__WB_MANIFEST);\n")?;
    let options = InjectManifestOptions {
      sw_src: Some(source),
      sw_dest: "static/service-worker.js".into(),
      manifest: ManifestSettings::default(),
      extra: Map::new(),
    };

    let path = WorkerGenerator.inject_manifest(&compilation(dir.path()), &options)?;
    let worker = fs::read_to_string(path)?;
    assert!(worker.starts_with("precacheAndRoute([{\"url\":\"/_next/static/chunks/main-abc.js\""));
    assert!(!worker.contains(INJECTION_POINT));
    Ok(())
  }

  #[test]
  fn injection_requires_marker_and_source() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("sw.js");
    fs::write(&source, "// nothing to inject into").unwrap();
    let mut options = InjectManifestOptions {
      sw_src: Some(source),
      sw_dest: "static/service-worker.js".into(),
      manifest: ManifestSettings::default(),
      extra: Map::new(),
    };

    let error = WorkerGenerator
      .inject_manifest(&compilation(dir.path()), &options)
      .unwrap_err();
    assert!(matches!(
      error.downcast_ref::<OfflineError>(),
      Some(OfflineError::MissingInjectionPoint { .. })
    ));

    options.sw_src = None;
    let error = WorkerGenerator
      .inject_manifest(&compilation(dir.path()), &options)
      .unwrap_err();
    assert!(matches!(
      error.downcast_ref::<OfflineError>(),
      Some(OfflineError::MissingWorkerSource)
    ));
  }
}
