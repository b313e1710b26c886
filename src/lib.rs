#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod assets;
pub mod compose;
pub mod config;
pub mod entry;
pub mod error;
pub mod export;
pub mod generator;
pub mod host;
pub mod mode;
pub mod models;
pub mod precache;
pub mod project;
pub mod template;

pub use compose::{BuildConfiguration, with_offline};
pub use config::OfflineOptions;
pub use error::OfflineError;
pub use mode::BuildMode;
pub use project::{OfflineBuildContext, ServiceWorkerPaths};

/// Result type used across the crate.
pub type BuildResult<T> = anyhow::Result<T>;
