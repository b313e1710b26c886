//! Merges the offline pipeline into a caller's build configuration.
//!
//! Every hook the pipeline needs is composed with the caller's hook of the same name:
//! the caller's hook always runs, with the original arguments, and its result is what
//! the host receives.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::OfflineOptions;
use crate::entry::{EntryInjection, REGISTER_ENTRY, wrap_entry_provider};
use crate::export::copy_worker_to_export;
use crate::generator::{GenerateSwOptions, InjectManifestOptions};
use crate::host::{BundlerConfig, BundlerOptions, BundlerPlugin, CopySource};
use crate::mode::{BuildMode, BuildSignals, ServingStrategy};
use crate::project::{OfflineBuildContext, ServiceWorkerPaths};
use crate::template::{DEV_WORKER, RegistrationTemplate};

/// Hook rewriting the bundler configuration for one compilation.
pub type BundlerHook =
  Box<dyn Fn(BundlerConfig, &BundlerOptions) -> Result<BundlerConfig> + Send + Sync>;

/// Hook providing runtime request rewrites to the serving process.
pub type RewritesHook = Box<dyn Fn() -> Result<Rewrites> + Send + Sync>;

/// Hook mapping export paths during a static export.
pub type ExportPathMapHook = Box<dyn Fn(PathMap, &ExportContext) -> Result<PathMap> + Send + Sync>;

/// A request rewrite performed by the serving process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Rewrite {
  /// Public request path.
  pub source: String,
  /// Path actually served.
  pub destination: String,
}

/// Rewrites as returned by a rewrites hook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Rewrites {
  /// Plain list, applied after filesystem routes.
  List(Vec<Rewrite>),
  /// Rewrites grouped by routing phase.
  #[serde(rename_all = "camelCase")]
  Phased {
    /// Checked before filesystem routes.
    #[serde(default)]
    before_files: Vec<Rewrite>,
    /// Checked after filesystem routes.
    #[serde(default)]
    after_files: Vec<Rewrite>,
    /// Checked after dynamic routes.
    #[serde(default)]
    fallback: Vec<Rewrite>,
  },
}

impl Rewrites {
  /// Every rewrite, in routing order.
  pub fn iter(&self) -> impl Iterator<Item = &Rewrite> {
    const NONE: &[Rewrite] = &[];
    let phases: [&[Rewrite]; 3] = match self {
      Self::List(list) => [list.as_slice(), NONE, NONE],
      Self::Phased {
        before_files,
        after_files,
        fallback,
      } => [
        before_files.as_slice(),
        after_files.as_slice(),
        fallback.as_slice(),
      ],
    };
    phases.into_iter().flatten()
  }
}

/// Append `additions` to whatever rewrites the caller already returned.
pub fn merge_rewrites(previous: Option<Rewrites>, additions: Vec<Rewrite>) -> Rewrites {
  match previous {
    None => Rewrites::List(additions),
    Some(Rewrites::List(mut list)) => {
      list.extend(additions);
      Rewrites::List(list)
    }
    Some(Rewrites::Phased {
      before_files,
      mut after_files,
      fallback,
    }) => {
      after_files.extend(additions);
      Rewrites::Phased {
        before_files,
        after_files,
        fallback,
      }
    }
  }
}

/// One exported page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExportPage {
  /// Page module rendered for the path.
  pub page: String,
  /// Query parameters passed to the page.
  #[serde(default, skip_serializing_if = "Map::is_empty")]
  pub query: Map<String, Value>,
}

/// Output path to page mapping of a static export.
pub type PathMap = BTreeMap<String, ExportPage>;

/// Directories and flags the host passes to the export-path-map hook.
#[derive(Debug, Clone, Default)]
pub struct ExportContext {
  /// Development export.
  pub dev: bool,
  /// Project directory.
  pub dir: PathBuf,
  /// Build output directory.
  pub dist_dir: PathBuf,
  /// Export output directory.
  pub out_dir: PathBuf,
  /// Build identifier.
  pub build_id: String,
}

/// The caller's build description.
#[derive(Default)]
pub struct BuildConfiguration {
  /// Offline pipeline options.
  pub offline: OfflineOptions,
  /// Every other caller setting, preserved as given.
  pub settings: Map<String, Value>,
  /// Bundler configuration hook.
  pub bundler: Option<BundlerHook>,
  /// Runtime rewrites hook.
  pub rewrites: Option<RewritesHook>,
  /// Export path map hook.
  pub export_path_map: Option<ExportPathMapHook>,
}

impl BuildConfiguration {
  /// Configuration carrying only offline options.
  pub fn with_options(offline: OfflineOptions) -> Self {
    Self {
      offline,
      ..Self::default()
    }
  }

  /// Run the bundler hook, or return `config` unchanged when there is none.
  pub fn run_bundler(
    &self,
    config: BundlerConfig,
    options: &BundlerOptions,
  ) -> Result<BundlerConfig> {
    match &self.bundler {
      Some(hook) => hook(config, options),
      None => Ok(config),
    }
  }

  /// Resolve the rewrites hook, if any.
  pub fn resolve_rewrites(&self) -> Result<Option<Rewrites>> {
    self.rewrites.as_ref().map(|hook| hook()).transpose()
  }

  /// Run the export path map hook, or return `default_map` when there is none.
  pub fn run_export_path_map(
    &self,
    default_map: PathMap,
    context: &ExportContext,
  ) -> Result<PathMap> {
    match &self.export_path_map {
      Some(hook) => hook(default_map, context),
      None => Ok(default_map),
    }
  }
}

/// Add the offline pipeline to `config`.
///
/// Server builds get a rewrite from the public worker URL to its build location;
/// export builds get an export step copying the worker into the output directory.
pub fn with_offline(
  config: BuildConfiguration,
  context: &OfflineBuildContext,
) -> BuildConfiguration {
  let BuildConfiguration {
    offline,
    settings,
    bundler,
    rewrites,
    export_path_map,
  } = config;

  let paths = ServiceWorkerPaths::new(&offline, &context.asset_prefix);

  let (rewrites, export_path_map) = match BuildMode::production(context.export).serving() {
    ServingStrategy::Rewrite => (Some(compose_rewrites(rewrites, &paths)), export_path_map),
    ServingStrategy::ExportCopy => (
      rewrites,
      Some(compose_export_path_map(export_path_map, paths.clone())),
    ),
  };

  let pipeline = OfflinePipeline {
    options: offline.clone(),
    context: context.clone(),
    paths,
    template: RegistrationTemplate::default(),
  };

  BuildConfiguration {
    offline,
    settings,
    bundler: Some(compose_bundler(bundler, pipeline)),
    rewrites,
    export_path_map,
  }
}

fn compose_rewrites(previous: Option<RewritesHook>, paths: &ServiceWorkerPaths) -> RewritesHook {
  let rewrite = Rewrite {
    source: paths.public_url(),
    destination: paths.served_url(),
  };

  Box::new(move || -> Result<Rewrites> {
    let existing = previous.as_ref().map(|hook| hook()).transpose()?;
    Ok(merge_rewrites(existing, vec![rewrite.clone()]))
  })
}

fn compose_export_path_map(
  previous: Option<ExportPathMapHook>,
  paths: ServiceWorkerPaths,
) -> ExportPathMapHook {
  Box::new(move |default_map: PathMap, context: &ExportContext| -> Result<PathMap> {
    copy_worker_to_export(&context.dist_dir, &context.out_dir, &paths)?;
    match &previous {
      Some(hook) => hook(default_map, context),
      None => Ok(default_map),
    }
  })
}

fn compose_bundler(previous: Option<BundlerHook>, pipeline: OfflinePipeline) -> BundlerHook {
  Box::new(move |config: BundlerConfig, options: &BundlerOptions| -> Result<BundlerConfig> {
    let config = pipeline.configure(config, options)?;
    match &previous {
      Some(hook) => hook(config, options),
      None => Ok(config),
    }
  })
}

struct OfflinePipeline {
  options: OfflineOptions,
  context: OfflineBuildContext,
  paths: ServiceWorkerPaths,
  template: RegistrationTemplate,
}

impl OfflinePipeline {
  fn configure(
    &self,
    mut config: BundlerConfig,
    options: &BundlerOptions,
  ) -> Result<BundlerConfig> {
    options.ensure_compatible()?;

    let signals = BuildSignals {
      export: self.context.export,
      dev: options.dev,
    };
    let mode = BuildMode::select(&signals, self.options.generate_in_dev_mode);
    tracing::debug!(
      ?mode,
      serving = ?mode.serving(),
      is_server = options.is_server,
      "configuring service worker build"
    );

    if !mode.generates() {
      config.plugins.push(BundlerPlugin::CopyFile {
        from: self.dev_worker_source(),
        to: self.paths.build_dest().to_string(),
      });
      return Ok(config);
    }

    // The worker is produced once, by the client compilation.
    if options.is_server {
      return Ok(config);
    }

    config.plugins.push(BundlerPlugin::CollectPublicAssets {
      public_dir: self.context.public_dir(),
    });
    config.plugins.push(self.generation_plugin());

    if !self.options.dont_auto_register_sw {
      config.entry = wrap_entry_provider(config.entry, self.entry_injection());
    }

    Ok(config)
  }

  fn dev_worker_source(&self) -> CopySource {
    match &self.options.dev_sw_src {
      Some(path) => CopySource::File(self.context.resolve(path)),
      None => CopySource::Inline(DEV_WORKER),
    }
  }

  fn generation_plugin(&self) -> BundlerPlugin {
    let workbox = &self.options.workbox_opts;
    let sw_dest = self.paths.build_dest();

    if self.options.generate_sw {
      if let Some(sw_src) = &workbox.sw_src {
        tracing::warn!(
          "ignoring workboxOpts.swSrc ({}) because generateSw is enabled",
          sw_src.display()
        );
      }
      BundlerPlugin::GenerateSw(GenerateSwOptions::from_workbox(workbox, sw_dest))
    } else {
      let mut inject = InjectManifestOptions::from_workbox(workbox, sw_dest);
      inject.sw_src = inject.sw_src.map(|path| self.context.resolve(&path));
      BundlerPlugin::InjectManifest(inject)
    }
  }

  fn entry_injection(&self) -> EntryInjection {
    EntryInjection {
      entry_name: REGISTER_ENTRY.to_string(),
      compiled_path: self.context.compiled_register_path(),
      template: self.template.clone(),
      sw_url: self.paths.public_url(),
      scope: self.options.scope.clone(),
    }
  }
}
