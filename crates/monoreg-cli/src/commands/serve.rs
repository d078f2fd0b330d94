//! Serve command implementation.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use tracing::info;

use monoreg_core::VersionStore;
use monoreg_registry::{ArchiveSource, CacheConfig, OnDemandSource, PrecomputedSource};
use monoreg_server::{ServerConfig, DEFAULT_BASE_PATH, DEFAULT_BIND};

/// Arguments for the serve command.
#[derive(Args)]
#[command(group(ArgGroup::new("source").required(true).args(["repo", "assets"])))]
pub struct ServeArgs {
    /// Module repository; archives are synthesized per request
    #[arg(long, env = "MONOREG_REPO")]
    pub repo: Option<PathBuf>,

    /// Asset cache written by `monoreg build`; archives are served from disk
    #[arg(long, env = "MONOREG_ASSETS")]
    pub assets: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "MONOREG_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Base path advertised for the modules.v1 service
    #[arg(long, env = "MONOREG_BASE_PATH", default_value = DEFAULT_BASE_PATH)]
    pub base_path: String,

    /// Skip archive checksum verification when serving from an asset cache
    #[arg(long, env = "MONOREG_NO_VERIFY")]
    pub no_verify: bool,
}

/// Runs the serve command.
pub async fn run(args: ServeArgs) -> Result<()> {
    let config = ServerConfig::new(args.bind).with_base_path(args.base_path.as_str());
    config.validate().context("invalid --base-path")?;

    let source = open_source(&args)?;
    info!(strategy = source.strategy(), bind = %args.bind, "Starting registry");

    monoreg_server::serve(config, source)
        .await
        .context("registry server failed")
}

fn open_source(args: &ServeArgs) -> Result<Arc<dyn ArchiveSource>> {
    if let Some(assets) = &args.assets {
        let config = CacheConfig::new(assets).with_verify_checksums(!args.no_verify);
        let source = PrecomputedSource::open(config)
            .with_context(|| format!("failed to open asset cache {}", assets.display()))?;
        return Ok(Arc::new(source));
    }

    let repo = args
        .repo
        .as_ref()
        .context("either --repo or --assets is required")?;
    let store = VersionStore::open(repo)
        .with_context(|| format!("failed to open module repository {}", repo.display()))?;
    info!(git_dir = %store.git_dir().display(), "Serving archives from repository");
    Ok(Arc::new(OnDemandSource::new(Arc::new(store))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_base_path_is_an_error() {
        let args = ServeArgs {
            repo: Some(PathBuf::from("/nonexistent/modules")),
            assets: None,
            bind: "127.0.0.1:0".parse().unwrap(),
            base_path: "/modules/:version".to_string(),
            no_verify: false,
        };

        let err = run(args).await.unwrap_err();
        assert!(err.to_string().contains("invalid --base-path"));
    }
}
