//! Archive command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use monoreg_core::{archive_digest, normalize_ref, synthesize, VersionStore};

/// Arguments for the archive command.
#[derive(Args)]
pub struct ArchiveArgs {
    /// Module name (top-level directory of the repository)
    pub module: String,

    /// Version to archive; `v` is prepended when missing, `main` when omitted
    #[arg(short, long = "ref")]
    pub reference: Option<String>,

    /// Module repository
    #[arg(long, env = "MONOREG_REPO", default_value = ".")]
    pub repo: PathBuf,

    /// Output file (defaults to `<module>.tar.gz`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ArchiveArgs {
    /// Returns the file the archive is written to.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.tar.gz", self.module)))
    }
}

/// Runs the archive command.
pub fn run(args: &ArchiveArgs) -> Result<()> {
    let version = normalize_ref(args.reference.as_deref());
    let store = VersionStore::open(&args.repo)
        .with_context(|| format!("failed to open module repository {}", args.repo.display()))?;

    let handle = store.checkout().context("failed to open repository handle")?;
    let tree = handle
        .resolve_tag(&version)
        .with_context(|| format!("failed to resolve {version}"))?;
    let bytes = synthesize(&tree, &args.module)
        .with_context(|| format!("failed to build archive of {}", args.module))?;

    let output = args.output_path();
    std::fs::write(&output, &bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(
        module = %args.module,
        version = %version,
        commit = %tree.commit_id(),
        size = bytes.len(),
        "Wrote archive"
    );
    println!("{}  {}", archive_digest(&bytes), output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use monoreg_core::fixtures::FixtureRepo;

    #[test]
    fn test_run_writes_archive() {
        let repo = FixtureRepo::new();
        repo.commit(&[("docker/main.tf", "x"), ("aws/main.tf", "y")]);
        repo.tag_lightweight("v1.0.0");
        let out = tempfile::tempdir().unwrap();
        let output = out.path().join("docker.tgz");

        let args = ArchiveArgs {
            module: "docker".to_string(),
            reference: Some("1.0.0".to_string()),
            repo: repo.path().to_path_buf(),
            output: Some(output.clone()),
        };
        run(&args).unwrap();

        let store = VersionStore::open(repo.path()).unwrap();
        let handle = store.checkout().unwrap();
        let expected = synthesize(&handle.resolve_tag("v1.0.0").unwrap(), "docker").unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), expected);
    }

    #[test]
    fn test_run_unknown_tag_fails() {
        let repo = FixtureRepo::new();
        repo.commit(&[("docker/main.tf", "x")]);
        let out = tempfile::tempdir().unwrap();

        let args = ArchiveArgs {
            module: "docker".to_string(),
            reference: Some("v9.0.0".to_string()),
            repo: repo.path().to_path_buf(),
            output: Some(out.path().join("docker.tar.gz")),
        };
        assert!(run(&args).is_err());
        assert!(!out.path().join("docker.tar.gz").exists());
    }
}
