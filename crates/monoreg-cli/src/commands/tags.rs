//! Tags command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use monoreg_core::VersionStore;

/// Arguments for the tags command.
#[derive(Args)]
pub struct TagsArgs {
    /// Module repository
    #[arg(long, env = "MONOREG_REPO", default_value = ".")]
    pub repo: PathBuf,
}

/// A tag and the commit it resolves to, or why it does not resolve.
#[derive(Debug, PartialEq, Eq)]
pub struct TagLine {
    pub tag: String,
    pub commit: std::result::Result<String, String>,
}

/// Runs the tags command.
pub fn run(args: &TagsArgs) -> Result<()> {
    let store = VersionStore::open(&args.repo)
        .with_context(|| format!("failed to open module repository {}", args.repo.display()))?;

    let lines = resolve_all(&store)?;
    info!(tags = lines.len(), "Listed tags");

    for line in &lines {
        match &line.commit {
            Ok(commit) => println!("{}\t{commit}", line.tag),
            Err(reason) => println!("{}\t<unresolvable: {reason}>", line.tag),
        }
    }

    Ok(())
}

/// Resolves every tag of `store`, keeping failures per tag.
pub fn resolve_all(store: &VersionStore) -> Result<Vec<TagLine>> {
    let handle = store.checkout().context("failed to open repository handle")?;
    let tags = handle.list_tags().context("failed to list tags")?;

    Ok(tags
        .into_iter()
        .map(|tag| {
            let commit = handle
                .resolve_tag(&tag)
                .map(|tree| tree.commit_id())
                .map_err(|e| {
                    warn!(tag = %tag, error = %e, "Tag does not resolve to a commit");
                    e.to_string()
                });
            TagLine { tag, commit }
        })
        .collect())
}
