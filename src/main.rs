use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use offline_sw_bundler::compose::{ExportContext, PathMap};
use offline_sw_bundler::entry::{EntryMap, EntryPoint, REGISTER_ENTRY, static_entries};
use offline_sw_bundler::generator::WorkerGenerator;
use offline_sw_bundler::host::{BundlerConfig, BundlerOptions, Compilation};
use offline_sw_bundler::models::AssetManifestEntry;
use offline_sw_bundler::precache::{PrecacheBlacklist, UrlRewriter, filter_manifest};
use offline_sw_bundler::project::STATIC_OUTPUT_DIR;
use offline_sw_bundler::template::{RUNTIME_MODULE, RegistrationTemplate};
use offline_sw_bundler::{BuildConfiguration, OfflineBuildContext, OfflineOptions, with_offline};

#[derive(Parser)]
#[command(name = "offline-sw", version, about = "Wire an offline service worker into a build")]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run the bundler hook against an existing build output and generate the worker.
  Build {
    /// Project root containing `offline.config.json` and `public/`.
    #[arg(long, default_value = ".")]
    project: PathBuf,
    /// Build output directory, relative to the project.
    #[arg(long, default_value = ".next")]
    dist: PathBuf,
    /// Treat the build as a development build.
    #[arg(long)]
    dev: bool,
    /// Treat the build as the server compilation.
    #[arg(long)]
    server: bool,
    /// JSON file holding the entry-point map.
    #[arg(long)]
    entries: Option<PathBuf>,
  },
  /// Copy the built worker into a static export directory.
  Export {
    /// Project root.
    #[arg(long, default_value = ".")]
    project: PathBuf,
    /// Build output directory, relative to the project.
    #[arg(long, default_value = ".next")]
    dist: PathBuf,
    /// Export output directory, relative to the project.
    #[arg(long, default_value = "out")]
    out: PathBuf,
  },
  /// Render the registration bootstrap script.
  RenderRegister {
    /// URL the worker is registered under.
    #[arg(long, default_value = "/service-worker.js")]
    sw_path: String,
    /// Registration scope.
    #[arg(long, default_value = "/")]
    scope: String,
    /// Output file.
    #[arg(long)]
    out: PathBuf,
  },
  /// Rewrite and filter a JSON pre-cache manifest with the default rules.
  FilterManifest {
    /// JSON array of `{ url, revision }` entries.
    input: PathBuf,
  },
  /// Print the manual registration runtime module.
  Runtime,
}

fn main() -> Result<()> {
  init_logging();

  match Cli::parse().command {
    Command::Build {
      project,
      dist,
      dev,
      server,
      entries,
    } => build(&project, &dist, dev, server, entries.as_deref()),
    Command::Export { project, dist, out } => export(&project, &dist, &out),
    Command::RenderRegister {
      sw_path,
      scope,
      out,
    } => {
      RegistrationTemplate::default().write(&out, &sw_path, &scope)?;
      Ok(())
    }
    Command::FilterManifest { input } => filter(&input),
    Command::Runtime => {
      print!("{RUNTIME_MODULE}");
      Ok(())
    }
  }
}

fn init_logging() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();
}

fn build(
  project: &Path,
  dist: &Path,
  dev: bool,
  server: bool,
  entries_path: Option<&Path>,
) -> Result<()> {
  let context = OfflineBuildContext::from_env(project);
  let options = OfflineOptions::discover(project)?;
  let config = with_offline(BuildConfiguration::with_options(options), &context);

  let entries = match entries_path {
    Some(path) => {
      let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
      serde_json::from_str::<EntryMap>(&content)
        .with_context(|| format!("failed to parse entry map in {}", path.display()))?
    }
    None => EntryMap::from([(REGISTER_ENTRY.to_string(), EntryPoint::List(Vec::new()))]),
  };

  let bundler_options = BundlerOptions {
    dev,
    is_server: server,
    ..BundlerOptions::client()
  };
  let bundler_config =
    config.run_bundler(BundlerConfig::new(static_entries(entries)), &bundler_options)?;
  let entries = (bundler_config.entry)()?;

  let dist_dir = context.resolve(dist);
  let mut compilation = Compilation::scan(
    &dist_dir,
    format!("{}/", context.asset_prefix),
    Path::new(STATIC_OUTPUT_DIR),
  )?;
  compilation.run_plugins(&bundler_config.plugins, &WorkerGenerator)?;

  let report = json!({
    "entries": entries,
    "rewrites": config.resolve_rewrites()?,
  });
  println!("{}", serde_json::to_string_pretty(&report)?);
  Ok(())
}

fn export(project: &Path, dist: &Path, out: &Path) -> Result<()> {
  let context = OfflineBuildContext::new(project).with_export(true);
  let options = OfflineOptions::discover(project)?;
  let config = with_offline(BuildConfiguration::with_options(options), &context);

  let export_context = ExportContext {
    dir: project.to_path_buf(),
    dist_dir: context.resolve(dist),
    out_dir: context.resolve(out),
    ..ExportContext::default()
  };
  let path_map = config.run_export_path_map(PathMap::new(), &export_context)?;
  println!("{}", serde_json::to_string_pretty(&path_map)?);
  Ok(())
}

fn filter(input: &Path) -> Result<()> {
  let content =
    fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
  let manifest: Vec<AssetManifestEntry> = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse manifest in {}", input.display()))?;

  let rewritten = UrlRewriter::default().rewrite_entries(manifest);
  let filtered = filter_manifest(rewritten, &PrecacheBlacklist::default());
  println!("{}", serde_json::to_string_pretty(&filtered)?);
  Ok(())
}
