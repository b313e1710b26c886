//! Placeholder substitution for the bundled JavaScript templates.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::{Captures, Regex};

/// Runtime registration script prepended to the application entry point.
pub const REGISTER_TEMPLATE: &str = include_str!("../assets/register-sw.js");

/// Manual `register` / `unregister` helpers for applications that opt out of
/// automatic registration.
pub const RUNTIME_MODULE: &str = include_str!("../assets/runtime.js");

/// Fallback worker copied verbatim during development builds.
pub const DEV_WORKER: &str = include_str!("../assets/service-worker.js");

/// Worker body written by [`crate::generator::WorkerGenerator`].
pub const GENERATED_WORKER_TEMPLATE: &str = include_str!("../assets/generated-sw.js");

/// Token substituted with the served worker path.
pub const SW_PATH_TOKEN: &str = "SW_PATH";
/// Token substituted with the registration scope.
pub const SW_SCOPE_TOKEN: &str = "SW_SCOPE";

fn placeholder_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"\{([A-Z_]+)\}").expect("invalid placeholder regex"))
}

/// Substitute `{KEY}` tokens in a single pass. Unknown tokens are left as-is and
/// substituted values are never rescanned.
pub fn render_template(template: &str, subs: &[(&str, &str)]) -> String {
  placeholder_pattern()
    .replace_all(template, |caps: &Captures<'_>| {
      subs
        .iter()
        .find(|(key, _)| *key == &caps[1])
        .map(|(_, value)| (*value).to_string())
        .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

/// Write `content` unless the file already holds exactly those bytes.
///
/// Returns `true` when the file was (re)written.
pub fn write_if_changed(path: &Path, content: &str) -> Result<bool> {
  if fs::read(path).is_ok_and(|existing| existing == content.as_bytes()) {
    return Ok(false);
  }

  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
  Ok(true)
}

/// The registration bootstrap template and the two values substituted into it.
#[derive(Debug, Clone)]
pub struct RegistrationTemplate {
  source: String,
}

impl Default for RegistrationTemplate {
  fn default() -> Self {
    Self {
      source: REGISTER_TEMPLATE.to_string(),
    }
  }
}

impl RegistrationTemplate {
  /// Render the template for a worker served at `sw_path` with the given scope.
  pub fn render(&self, sw_path: &str, scope: &str) -> String {
    let sw_path = escape_js_single_quoted(sw_path);
    let scope = escape_js_single_quoted(scope);
    render_template(&self.source, &[
      (SW_PATH_TOKEN, sw_path.as_str()),
      (SW_SCOPE_TOKEN, scope.as_str()),
    ])
  }

  /// Render and write to `output`, leaving an identical previous render untouched.
  pub fn write(&self, output: &Path, sw_path: &str, scope: &str) -> Result<bool> {
    let rendered = self.render(sw_path, scope);
    let written = write_if_changed(output, &rendered)?;
    if written {
      tracing::info!("wrote service worker registration script to {}", output.display());
    }
    Ok(written)
  }
}

/// Write the runtime helper module next to other plugin artifacts.
pub fn write_runtime_module(dir: &Path) -> Result<std::path::PathBuf> {
  let target = dir.join("runtime.js");
  write_if_changed(&target, RUNTIME_MODULE)?;
  Ok(target)
}

fn escape_js_single_quoted(value: &str) -> String {
  value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn renders_registration_values() {
    let rendered = RegistrationTemplate::default().render("/service-worker.js", "/");
    assert!(rendered.contains(".register('/service-worker.js', { scope: '/' })"));
    assert!(!rendered.contains("{SW_PATH}"));
    assert!(!rendered.contains("{SW_SCOPE}"));
  }

  #[test]
  fn substituted_values_are_not_rescanned() {
    let rendered = render_template("{A} {B}", &[("A", "{B}"), ("B", "b")]);
    assert_eq!(rendered, "{B} b");
  }

  #[test]
  fn unknown_tokens_survive() {
    assert_eq!(render_template("x {OTHER} y", &[("A", "a")]), "x {OTHER} y");
  }

  #[test]
  fn escapes_quotes_in_values() {
    let rendered = RegistrationTemplate::default().render("/it's.js", "/");
    assert!(rendered.contains("'/it\\'s.js'"));
  }

  #[test]
  fn rewrites_only_when_inputs_change() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("nested/register-sw-compiled.js");
    let template = RegistrationTemplate::default();

    assert!(template.write(&output, "/service-worker.js", "/")?);
    let first = fs::read(&output)?;
    assert!(!template.write(&output, "/service-worker.js", "/")?);
    assert_eq!(fs::read(&output)?, first);

    assert!(template.write(&output, "/foobar/service-worker.js", "/foobar/")?);
    let updated = fs::read_to_string(&output)?;
    assert!(updated.contains("'/foobar/service-worker.js'"));
    Ok(())
  }

  #[test]
  fn runtime_module_exposes_manual_helpers() -> Result<()> {
    let dir = tempdir()?;
    let path = write_runtime_module(dir.path())?;
    let content = fs::read_to_string(path)?;
    assert!(content.contains("function register(swPath, options)"));
    assert!(content.contains("function unregister()"));
    Ok(())
  }
}
