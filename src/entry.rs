//! Prepends the registration bootstrap to the application's main entry point.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::template::RegistrationTemplate;

/// Entry point that receives the registration bootstrap.
pub const REGISTER_ENTRY: &str = "main.js";

/// Value of one named entry point in the host configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EntryPoint {
  /// Ordered list of modules bundled into the entry.
  List(Vec<String>),
  /// Any other shape (single module, descriptor object). Left untouched.
  Other(Value),
}

/// Named entry points of a build.
pub type EntryMap = BTreeMap<String, EntryPoint>;

/// Deferred provider of the entry map. The host may call it once per (re)build.
pub type EntryProvider = Arc<dyn Fn() -> Result<EntryMap> + Send + Sync>;

/// Result of one injection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionOutcome {
  /// The bootstrap was inserted at the front of the entry list.
  Injected,
  /// The bootstrap was already present; nothing changed.
  AlreadyPresent,
  /// The entry shape cannot take a prepended module; nothing changed.
  Unsupported {
    /// Human readable description of the problem.
    reason: String,
  },
}

/// Prepend `module` to the list stored under `entry_name`.
///
/// `before_insert` runs only when an insertion is about to happen, so the referenced
/// file can be fully written before its path lands in the entry list. Unsupported
/// shapes are reported through the outcome rather than as an error.
pub fn inject_registration(
  entries: &mut EntryMap,
  entry_name: &str,
  module: &str,
  before_insert: impl FnOnce() -> Result<()>,
) -> Result<InjectionOutcome> {
  let list = match entries.get_mut(entry_name) {
    Some(EntryPoint::List(list)) => list,
    Some(EntryPoint::Other(_)) => {
      return Ok(InjectionOutcome::Unsupported {
        reason: format!("entry-point \"{entry_name}\" is not an array"),
      });
    }
    None => {
      return Ok(InjectionOutcome::Unsupported {
        reason: format!("entry-point \"{entry_name}\" does not exist"),
      });
    }
  };

  if list.iter().any(|existing| existing == module) {
    return Ok(InjectionOutcome::AlreadyPresent);
  }

  before_insert()?;
  list.insert(0, module.to_string());
  Ok(InjectionOutcome::Injected)
}

/// Everything needed to render and inject the registration bootstrap.
#[derive(Debug, Clone)]
pub struct EntryInjection {
  /// Entry point receiving the bootstrap.
  pub entry_name: String,
  /// Fixed location of the rendered bootstrap.
  pub compiled_path: PathBuf,
  /// Template rendered into `compiled_path`.
  pub template: RegistrationTemplate,
  /// URL the worker is registered under.
  pub sw_url: String,
  /// Registration scope.
  pub scope: String,
}

impl EntryInjection {
  /// Apply the injection to an already resolved entry map.
  pub fn apply(&self, entries: &mut EntryMap) -> Result<InjectionOutcome> {
    let module = self.compiled_path.to_string_lossy().into_owned();
    let outcome = inject_registration(entries, &self.entry_name, &module, || {
      self
        .template
        .write(&self.compiled_path, &self.sw_url, &self.scope)
        .map(|_| ())
    })?;

    match &outcome {
      InjectionOutcome::Injected => {
        tracing::debug!("prepended {module} to entry-point \"{}\"", self.entry_name);
      }
      InjectionOutcome::AlreadyPresent => {
        tracing::debug!("{module} already present in entry-point \"{}\"", self.entry_name);
      }
      InjectionOutcome::Unsupported { reason } => {
        tracing::warn!("failed to add service worker auto-registration script: {reason}");
      }
    }

    Ok(outcome)
  }
}

/// Wrap the host's entry provider so every resolution carries the bootstrap.
pub fn wrap_entry_provider(original: EntryProvider, injection: EntryInjection) -> EntryProvider {
  Arc::new(move || -> Result<EntryMap> {
    let mut entries = original()?;
    injection.apply(&mut entries)?;
    Ok(entries)
  })
}

/// Provider returning a fixed entry map.
pub fn static_entries(entries: EntryMap) -> EntryProvider {
  Arc::new(move || Ok(entries.clone()))
}
