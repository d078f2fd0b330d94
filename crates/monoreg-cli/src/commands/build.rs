//! Build command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use tempfile::TempDir;
use tracing::info;

use monoreg_core::VersionStore;
use monoreg_registry::{BuildConfig, BuildPass, DEFAULT_ASSETS_DIR};

/// Arguments for the build command.
#[derive(Args)]
#[command(group(ArgGroup::new("source").required(true).args(["repo", "clone_url"])))]
pub struct BuildArgs {
    /// Local module repository
    #[arg(long, env = "MONOREG_REPO")]
    pub repo: Option<PathBuf>,

    /// Remote module repository, cloned into a temporary directory
    #[arg(long = "clone", env = "MONOREG_CLONE_URL")]
    pub clone_url: Option<String>,

    /// Directory the asset cache is published to
    #[arg(short, long, env = "MONOREG_ASSETS", default_value = DEFAULT_ASSETS_DIR)]
    pub output: PathBuf,

    /// Number of tags built concurrently (defaults to the CPU count)
    #[arg(short, long, env = "MONOREG_JOBS")]
    pub jobs: Option<usize>,
}

/// Runs the build command.
pub async fn run(args: BuildArgs) -> Result<()> {
    let (store, _clone_dir) = open_store(&args)?;

    let mut config = BuildConfig::new(&args.output);
    if let Some(jobs) = args.jobs {
        config = config.with_jobs(jobs);
    }

    info!(output = %args.output.display(), jobs = config.jobs, "Building asset cache");

    let report = BuildPass::new(Arc::new(store), config)
        .run()
        .await
        .context("build failed; nothing was published")?;

    println!("monoreg asset cache");
    println!("===================");
    println!("Output:   {}", report.output.display());
    println!("Versions: {}", report.versions);
    println!("Modules:  {}", report.modules);
    println!("Archives: {}", report.archives);

    Ok(())
}

/// Opens the local repository, or clones the remote one into a temporary
/// directory that lives as long as the returned handle.
fn open_store(args: &BuildArgs) -> Result<(VersionStore, Option<TempDir>)> {
    if let Some(repo) = &args.repo {
        let store = VersionStore::open(repo)
            .with_context(|| format!("failed to open module repository {}", repo.display()))?;
        return Ok((store, None));
    }

    let url = args
        .clone_url
        .as_deref()
        .context("either --repo or --clone is required")?;
    let dir = tempfile::Builder::new()
        .prefix("monoreg-clone-")
        .tempdir()
        .context("failed to create clone directory")?;
    let store =
        VersionStore::clone_from(url, dir.path()).with_context(|| format!("failed to clone {url}"))?;
    Ok((store, Some(dir)))
}
