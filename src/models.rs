//! Data structures shared between the bundler model and the pre-cache pipeline.

use serde::{Deserialize, Serialize};

/// One build artifact eligible for pre-caching.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AssetManifestEntry {
  /// URL the worker requests when populating its cache.
  pub url: String,
  /// Cache-busting revision, `None` when the URL already carries a content hash.
  #[serde(default)]
  pub revision: Option<String>,
}

impl AssetManifestEntry {
  /// Create an entry from a URL and an optional revision.
  pub fn new(url: impl Into<String>, revision: Option<String>) -> Self {
    Self {
      url: url.into(),
      revision,
    }
  }
}

/// A file the host bundler emitted (or was told about) during a compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedAsset {
  /// Asset name relative to the compilation output directory, using forward slashes.
  pub name: String,
  /// Revision for assets whose name does not embed a content hash.
  pub revision: Option<String>,
}

impl EmittedAsset {
  /// Asset with a hashed filename that needs no separate revision.
  pub fn hashed(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      revision: None,
    }
  }

  /// Asset with an explicit revision.
  pub fn revisioned(name: impl Into<String>, revision: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      revision: Some(revision.into()),
    }
  }

  /// Build the pre-cache entry for this asset under the given public path.
  ///
  /// The host joins `public_path` and `name` verbatim, which is what produces the
  /// `/_next//static/` artifact the URL rewriter later corrects.
  pub fn to_manifest_entry(&self, public_path: &str) -> AssetManifestEntry {
    AssetManifestEntry {
      url: format!("{public_path}{}", self.name),
      revision: self.revision.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn manifest_entry_serialises_null_revision() {
    let entry = AssetManifestEntry::new("/_next/static/chunks/main-abc.js", None);
    let json = serde_json::to_string(&entry).unwrap();
    assert_eq!(json, r#"{"url":"/_next/static/chunks/main-abc.js","revision":null}"#);
  }

  #[test]
  fn joins_public_path_without_normalising() {
    let asset = EmittedAsset::hashed("/static/chunks/main.js");
    assert_eq!(
      asset.to_manifest_entry("/_next/").url,
      "/_next//static/chunks/main.js"
    );
  }
}
