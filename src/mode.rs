//! Selection of the output strategy for a build invocation.

/// Signals observed once at the start of a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSignals {
  /// The build output will be statically exported.
  pub export: bool,
  /// The host is running a development build.
  pub dev: bool,
}

/// How the worker reaches the served output for this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
  /// A long-running server serves the worker through a request rewrite.
  ServerDynamic,
  /// The worker is copied into the export directory; no server exists at serve time.
  StaticExport,
  /// The developer worker is copied verbatim; nothing is generated or injected.
  DevelopmentPassthrough,
}

impl BuildMode {
  /// Pick the mode for a build. Development wins unless generation in development has
  /// been explicitly enabled.
  pub fn select(signals: &BuildSignals, generate_in_dev_mode: bool) -> Self {
    if signals.dev && !generate_in_dev_mode {
      Self::DevelopmentPassthrough
    } else if signals.export {
      Self::StaticExport
    } else {
      Self::ServerDynamic
    }
  }

  /// Mode of a non-development compilation. Hooks installed before any compilation
  /// runs are chosen from this, since the dev flag arrives per compilation.
  pub fn production(export: bool) -> Self {
    Self::select(&BuildSignals { export, dev: false }, false)
  }

  /// Whether this mode runs manifest generation, asset collection and entry injection.
  pub fn generates(self) -> bool {
    !matches!(self, Self::DevelopmentPassthrough)
  }

  /// How the worker produced in this mode reaches its public URL.
  pub fn serving(self) -> ServingStrategy {
    match self {
      Self::StaticExport => ServingStrategy::ExportCopy,
      Self::ServerDynamic | Self::DevelopmentPassthrough => ServingStrategy::Rewrite,
    }
  }
}

/// Delivery of the built worker to `/<swDest>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServingStrategy {
  /// The serving process rewrites the public URL onto the build location.
  Rewrite,
  /// The worker is copied into the export directory after the build.
  ExportCopy,
}
