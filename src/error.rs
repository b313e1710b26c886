//! Error taxonomy for conditions the offline pipeline raises itself.
//!
//! Third-party I/O failures are not wrapped here; they propagate through
//! [`crate::BuildResult`] with added context.

use std::path::PathBuf;

use thiserror::Error;

/// Errors originating in the offline pipeline.
#[derive(Debug, Error)]
pub enum OfflineError {
  /// The host bundler does not expose the hook surface the pipeline needs.
  #[error(
    "this plugin is not compatible with host bundler versions below {minimum}: {reason}"
  )]
  IncompatibleHost {
    /// Lowest supported host version.
    minimum: &'static str,
    /// What was missing from the host options.
    reason: String,
  },
  /// A worker source used for manifest injection lacks the injection point.
  #[error("unable to find the injection point `{marker}` in {}", path.display())]
  MissingInjectionPoint {
    /// Worker source that was searched.
    path: PathBuf,
    /// Marker that should have been present.
    marker: &'static str,
  },
  /// Manifest injection was requested without a worker source.
  #[error("`workboxOpts.swSrc` is required when `generateSw` is false")]
  MissingWorkerSource,
  /// A blacklist pattern failed to compile.
  #[error("invalid pre-cache exclusion pattern `{pattern}`")]
  InvalidPattern {
    /// Pattern source text.
    pattern: String,
    /// Underlying regex error.
    #[source]
    source: regex::Error,
  },
}
