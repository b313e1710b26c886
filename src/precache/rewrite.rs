use std::collections::BTreeMap;

use crate::models::AssetManifestEntry;

/// The host joins its public path and asset names without normalising.
const HOST_JOIN_PREFIX: &str = "/_next//static/";
const HOST_JOIN_REPLACEMENT: &str = "/_next/static/";

/// Map a build-output URL prefix onto the prefix it is served from at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRewriteRule {
  /// Prefix produced by the build.
  pub prefix: String,
  /// Prefix the asset is served under. Empty means the site root.
  pub replacement: String,
}

impl UrlRewriteRule {
  /// Create a rule.
  pub fn new(prefix: impl Into<String>, replacement: impl Into<String>) -> Self {
    Self {
      prefix: prefix.into(),
      replacement: replacement.into(),
    }
  }

  fn apply(&self, url: &str) -> Option<String> {
    let rest = url.strip_prefix(self.prefix.as_str())?;
    Some(join_prefix(&self.replacement, rest))
  }
}

/// Join a replacement prefix and the unmatched remainder of a URL.
///
/// A slash on either side of the seam collapses to exactly one; a prefix that ended
/// mid-segment is joined verbatim.
fn join_prefix(replacement: &str, rest: &str) -> String {
  let head = if replacement.is_empty() { "/" } else { replacement };
  if head.ends_with('/') || rest.starts_with('/') {
    format!(
      "{}/{}",
      head.trim_end_matches('/'),
      rest.trim_start_matches('/')
    )
  } else {
    format!("{head}{rest}")
  }
}

/// Ordered, immutable list of prefix rewrites. The first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRewriter {
  rules: Vec<UrlRewriteRule>,
}

impl Default for UrlRewriter {
  fn default() -> Self {
    Self::new(vec![
      UrlRewriteRule::new(HOST_JOIN_PREFIX, HOST_JOIN_REPLACEMENT),
      // Public assets copied into the build graph are served from the site root.
      UrlRewriteRule::new("/_next/public/", "/"),
    ])
  }
}

impl UrlRewriter {
  /// Build a rewriter from explicit rules.
  pub fn new(rules: Vec<UrlRewriteRule>) -> Self {
    Self { rules }
  }

  /// Build a rewriter from a caller's `prefix -> replacement` table.
  ///
  /// JSON objects carry no order, so longer prefixes are tried first to keep the more
  /// specific rule winning. The host's double-slash fix is appended unless the table
  /// already names that prefix.
  pub fn from_prefix_map(map: &BTreeMap<String, String>) -> Self {
    let mut rules: Vec<UrlRewriteRule> = map
      .iter()
      .map(|(prefix, replacement)| UrlRewriteRule::new(prefix.clone(), replacement.clone()))
      .collect();
    rules.sort_by(|left, right| right.prefix.len().cmp(&left.prefix.len()));
    if !map.contains_key(HOST_JOIN_PREFIX) {
      rules.push(UrlRewriteRule::new(HOST_JOIN_PREFIX, HOST_JOIN_REPLACEMENT));
    }
    Self { rules }
  }

  /// Rewrite a single URL.
  pub fn rewrite(&self, url: &str) -> String {
    rewrite_url(url, &self.rules)
  }

  /// Rewrite every entry URL in place, leaving revisions untouched.
  pub fn rewrite_entries(&self, entries: Vec<AssetManifestEntry>) -> Vec<AssetManifestEntry> {
    entries
      .into_iter()
      .map(|entry| AssetManifestEntry {
        url: self.rewrite(&entry.url),
        revision: entry.revision,
      })
      .collect()
  }
}

/// Apply the first rule whose prefix matches `url`; unmatched URLs pass through.
pub fn rewrite_url(url: &str, rules: &[UrlRewriteRule]) -> String {
  rules
    .iter()
    .find_map(|rule| rule.apply(url))
    .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn prefix_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
      .iter()
      .map(|(prefix, replacement)| (prefix.to_string(), replacement.to_string()))
      .collect()
  }

  #[test]
  fn fixes_double_slash_artifact() {
    let rewriter = UrlRewriter::default();
    assert_eq!(
      rewriter.rewrite("/_next//static/chunks/main-abc.js"),
      "/_next/static/chunks/main-abc.js"
    );
  }

  #[test]
  fn double_slash_fix_is_idempotent() {
    let rewriter = UrlRewriter::default();
    for url in [
      "/_next//static/chunks/webpack-1.js",
      "/_next/static/chunks/webpack-1.js",
      "/favicon.ico",
    ] {
      let once = rewriter.rewrite(url);
      assert_eq!(rewriter.rewrite(&once), once);
    }
  }

  #[test]
  fn maps_public_assets_to_site_root() {
    let rewriter = UrlRewriter::default();
    assert_eq!(rewriter.rewrite("/_next/public/image.jpg"), "/image.jpg");
    assert_eq!(rewriter.rewrite("/_next/public/icons/a.png"), "/icons/a.png");
  }

  #[test]
  fn unmatched_urls_pass_through() {
    let rewriter = UrlRewriter::default();
    assert_eq!(rewriter.rewrite("/other/static/x.js"), "/other/static/x.js");
  }

  #[test]
  fn first_matching_rule_wins() {
    let rules = vec![
      UrlRewriteRule::new("/a/", "/first/"),
      UrlRewriteRule::new("/a/b/", "/second/"),
    ];
    assert_eq!(rewrite_url("/a/b/c.js", &rules), "/first/b/c.js");
  }

  #[test]
  fn joins_with_exactly_one_slash() {
    let cases = [
      ("/assets", "/", "/assets/x.js", "/x.js"),
      ("/assets/", "/cdn", "/assets/x.js", "/cdn/x.js"),
      ("/assets", "/cdn/", "/assets//x.js", "/cdn/x.js"),
      ("/_next", "/cdn", "/_next//static/a.js", "/cdn/static/a.js"),
      ("/assets/", "https://cdn.test/", "/assets/x.js", "https://cdn.test/x.js"),
      ("/chunks/main-", "/c/app-", "/chunks/main-1.js", "/c/app-1.js"),
    ];
    for (prefix, replacement, url, expected) in cases {
      let rules = vec![UrlRewriteRule::new(prefix, replacement)];
      assert_eq!(rewrite_url(url, &rules), expected, "{prefix} -> {replacement}");
    }
  }

  #[test]
  fn empty_replacement_maps_to_site_root() {
    let rules = vec![UrlRewriteRule::new("/_next/public/", "")];
    assert_eq!(rewrite_url("/_next/public/image.jpg", &rules), "/image.jpg");
  }

  #[test]
  fn prefix_map_prefers_longer_prefixes() {
    let rewriter = UrlRewriter::from_prefix_map(&prefix_map(&[
      ("/a/", "/first/"),
      ("/a/b/", "/second/"),
    ]));
    assert_eq!(rewriter.rewrite("/a/b/c.js"), "/second/c.js");
    assert_eq!(rewriter.rewrite("/a/c.js"), "/first/c.js");
  }

  #[test]
  fn prefix_map_keeps_host_double_slash_fix() {
    let rewriter = UrlRewriter::from_prefix_map(&prefix_map(&[("/_next/public/", "/assets/")]));
    assert_eq!(rewriter.rewrite("/_next//static/a.js"), "/_next/static/a.js");
    assert_eq!(rewriter.rewrite("/_next/public/logo.png"), "/assets/logo.png");
  }

  #[test]
  fn prefix_map_can_override_host_fix() {
    let rewriter = UrlRewriter::from_prefix_map(&prefix_map(&[("/_next//static/", "/s/")]));
    assert_eq!(rewriter.rewrite("/_next//static/a.js"), "/s/a.js");
  }
}
