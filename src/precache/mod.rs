//! Pre-cache manifest reconciliation.
//!
//! Split into the exclusion filter and the URL prefix rewriter so each rule set can be
//! constructed once and passed explicitly to the generator and the manifest transforms.

mod blacklist;
mod rewrite;

pub use blacklist::{BlacklistRule, PrecacheBlacklist, filter_manifest};
pub use rewrite::{UrlRewriteRule, UrlRewriter, rewrite_url};
