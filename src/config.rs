//! Caller-facing options controlling how the service worker is produced and registered.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::generator::RuntimeCaching;
use crate::precache::BlacklistRule;

const DEFAULT_CONFIG_FILE: &str = "offline.config.json";

/// Options recognised by the offline pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OfflineOptions {
  /// Worker script copied verbatim during development builds. Falls back to the
  /// bundled no-op worker.
  pub dev_sw_src: Option<PathBuf>,
  /// Skip prepending the registration script to the entry point.
  pub dont_auto_register_sw: bool,
  /// Run the full pipeline during development builds.
  pub generate_in_dev_mode: bool,
  /// Generate a complete worker (`true`) or inject the manifest into `workboxOpts.swSrc`.
  pub generate_sw: bool,
  /// Registration scope written into the bootstrap script.
  pub scope: String,
  /// Options forwarded to the pre-cache generator.
  pub workbox_opts: WorkboxOptions,
}

impl Default for OfflineOptions {
  fn default() -> Self {
    Self {
      dev_sw_src: None,
      dont_auto_register_sw: false,
      generate_in_dev_mode: false,
      generate_sw: true,
      scope: "/".into(),
      workbox_opts: WorkboxOptions::default(),
    }
  }
}

/// Generator options supplied by the caller. Each `Some` field overrides the plugin
/// default of the same name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkboxOptions {
  /// Worker destination relative to the build's static output root.
  pub sw_dest: Option<String>,
  /// Worker source used when injecting into an existing script.
  pub sw_src: Option<PathBuf>,
  /// Asset exclusion rules handed to the generator.
  pub exclude: Option<Vec<BlacklistRule>>,
  /// URL prefix rewrites handed to the generator.
  #[serde(rename = "modifyURLPrefix")]
  pub modify_url_prefix: Option<BTreeMap<String, String>>,
  /// Inline the worker runtime into the generated file.
  pub inline_workbox_runtime: Option<bool>,
  /// Runtime caching routes for the generated worker.
  pub runtime_caching: Option<Vec<RuntimeCaching>>,
  /// Unrecognised keys, passed through to the generator untouched.
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl OfflineOptions {
  /// Load options from `offline.config.json` in `project_dir`.
  ///
  /// A missing file yields the defaults. A file that exists but does not parse is an
  /// error, so a typo cannot silently revert an explicit setting.
  pub fn discover(project_dir: &Path) -> Result<Self> {
    let candidate = project_dir.join(DEFAULT_CONFIG_FILE);
    if !candidate.exists() {
      tracing::debug!("no {} found, using default options", candidate.display());
      return Ok(Self::default());
    }
    Self::from_path(&candidate)
  }

  /// Read options from a specific JSON file.
  pub fn from_path(path: &Path) -> Result<Self> {
    let content =
      fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
      .with_context(|| format!("failed to parse offline options in {}", path.display()))
  }
}
