use regex::Regex;
use serde::Deserialize;

use crate::error::OfflineError;
use crate::models::AssetManifestEntry;

/// Build metadata emitted by the host that must never be pre-cached.
const DEFAULT_SUFFIXES: [&str; 4] = [
  "react-loadable-manifest.json",
  "build-manifest.json",
  "_ssgManifest.js",
  "_buildManifest.js",
];

/// Source maps.
const DEFAULT_PATTERNS: [&str; 1] = [r"\.map$"];

/// A single exclusion rule for pre-cache candidates.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawRule")]
pub enum BlacklistRule {
  /// Filename suffix anchored at a path separator or at the start of the URL.
  Suffix(String),
  /// Regular expression tested against the full URL.
  Pattern(Regex),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRule {
  Suffix(String),
  Pattern { pattern: String },
}

impl TryFrom<RawRule> for BlacklistRule {
  type Error = OfflineError;

  fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
    match raw {
      RawRule::Suffix(suffix) => Ok(Self::Suffix(suffix)),
      RawRule::Pattern { pattern } => Self::pattern(&pattern),
    }
  }
}

impl BlacklistRule {
  /// Compile a pattern rule.
  pub fn pattern(source: &str) -> Result<Self, OfflineError> {
    Regex::new(source)
      .map(Self::Pattern)
      .map_err(|source_err| OfflineError::InvalidPattern {
        pattern: source.to_string(),
        source: source_err,
      })
  }

  /// Returns `true` when the rule excludes `url`.
  ///
  /// `build-manifest.json` matches `/_next/build-manifest.json` and
  /// `build-manifest.json`, but not `/_next/other-build-manifest.json`.
  pub fn matches(&self, url: &str) -> bool {
    match self {
      Self::Suffix(suffix) if suffix.starts_with('/') => url.ends_with(suffix.as_str()),
      Self::Suffix(suffix) => {
        url == suffix
          || url
            .strip_suffix(suffix.as_str())
            .is_some_and(|head| head.ends_with('/'))
      }
      Self::Pattern(pattern) => pattern.is_match(url),
    }
  }
}

/// Immutable set of exclusion rules applied to every pre-cache manifest.
#[derive(Debug, Clone)]
pub struct PrecacheBlacklist {
  rules: Vec<BlacklistRule>,
}

impl Default for PrecacheBlacklist {
  fn default() -> Self {
    let mut rules: Vec<BlacklistRule> = DEFAULT_SUFFIXES
      .iter()
      .map(|suffix| BlacklistRule::Suffix((*suffix).to_string()))
      .collect();
    rules.extend(DEFAULT_PATTERNS.iter().map(|pattern| {
      BlacklistRule::Pattern(Regex::new(pattern).expect("invalid default pattern"))
    }));
    Self { rules }
  }
}

impl PrecacheBlacklist {
  /// Build a blacklist from explicit rules.
  pub fn new(rules: Vec<BlacklistRule>) -> Self {
    Self { rules }
  }

  /// Returns `true` when any rule excludes `url`.
  pub fn is_excluded(&self, url: &str) -> bool {
    self.rules.iter().any(|rule| rule.matches(url))
  }
}

/// Drop every entry whose URL is excluded by `blacklist`, keeping the rest untouched
/// and in order.
pub fn filter_manifest(
  entries: Vec<AssetManifestEntry>,
  blacklist: &PrecacheBlacklist,
) -> Vec<AssetManifestEntry> {
  entries
    .into_iter()
    .filter(|entry| !blacklist.is_excluded(&entry.url))
    .collect()
}
