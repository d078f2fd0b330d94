//! Offline build pass that precomputes every module archive.
//!
//! The build resolves every tag, synthesizes the archive of every module
//! present at that tag and writes them, along with the Versions Manifest,
//! into a staging directory next to the output. Only when every tag has
//! succeeded is the staging directory moved into place, so a failed build
//! never publishes a manifest listing a version without its archives.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use monoreg_core::{synthesize_all, VersionStore, VersionsManifest};

use crate::cache::AssetCache;
use crate::config::{BuildConfig, CacheConfig};
use crate::error::{RegistryError, Result};

/// Outcome of a successful build pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Directory the asset cache was published to.
    pub output: PathBuf,
    /// Number of versions built.
    pub versions: usize,
    /// Number of distinct modules seen across all versions.
    pub modules: usize,
    /// Number of archives written.
    pub archives: usize,
}

/// Archives built for one tag: module name to digest.
type TagDigests = BTreeMap<String, String>;

/// Precomputes the asset cache for every tag of a repository.
#[derive(Debug)]
pub struct BuildPass {
    store: Arc<VersionStore>,
    config: BuildConfig,
}

impl BuildPass {
    /// Creates a build pass over `store`.
    #[must_use]
    pub const fn new(store: Arc<VersionStore>, config: BuildConfig) -> Self {
        Self { store, config }
    }

    /// Runs the build and publishes the result.
    ///
    /// Tags are processed on blocking worker threads, up to
    /// [`BuildConfig::jobs`] at a time. The first failure aborts the build:
    /// tags not yet started are skipped, and the staging directory is only
    /// removed once every worker has returned.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any tag, or an I/O error if the
    /// result cannot be published. Nothing is published on error.
    pub async fn run(&self) -> Result<BuildReport> {
        let store = Arc::clone(&self.store);
        let tags = tokio::task::spawn_blocking(move || store.list_tags()).await??;

        tracing::info!(
            versions = tags.len(),
            jobs = self.config.jobs,
            output = %self.config.output.display(),
            "Starting build"
        );

        let parent = output_parent(&self.config.output);
        std::fs::create_dir_all(&parent).map_err(|e| RegistryError::io(&parent, e))?;
        let staging = tempfile::Builder::new()
            .prefix(".monoreg-build-")
            .tempdir_in(&parent)
            .map_err(|e| RegistryError::io(&parent, e))?;
        let cache = Arc::new(AssetCache::new(CacheConfig::new(staging.path())));

        let cancelled = Arc::new(AtomicBool::new(false));
        let mut workers = stream::iter(tags.clone())
            .map(|tag| {
                let store = Arc::clone(&self.store);
                let cache = Arc::clone(&cache);
                let cancelled = Arc::clone(&cancelled);
                tokio::task::spawn_blocking(move || build_tag(&store, &cache, &tag, &cancelled))
            })
            .buffer_unordered(self.config.jobs);

        let mut built = Vec::with_capacity(tags.len());
        let mut failure = None;
        while let Some(joined) = workers.next().await {
            match joined.map_err(RegistryError::from).and_then(|result| result) {
                Ok(Some(tag)) => built.push(tag),
                Ok(None) => {}
                Err(e) => {
                    cancelled.store(true, Ordering::Relaxed);
                    if failure.is_none() {
                        tracing::warn!(error = %e, "Build failed, waiting for running tags");
                        failure = Some(e);
                    }
                }
            }
        }
        drop(workers);
        if let Some(e) = failure {
            return Err(e);
        }

        let mut manifest = VersionsManifest::new(tags);
        for (tag, digests) in built {
            for (module, digest) in digests {
                manifest.record_digest(tag.clone(), module, digest);
            }
        }
        let modules: BTreeSet<&str> = manifest
            .versions
            .iter()
            .flat_map(|version| manifest.modules(version))
            .collect();
        cache.write_manifest(&manifest)?;

        publish(staging.path(), &self.config.output)?;

        let report = BuildReport {
            output: self.config.output.clone(),
            versions: manifest.versions.len(),
            modules: modules.len(),
            archives: manifest.archive_count(),
        };
        tracing::info!(
            versions = report.versions,
            modules = report.modules,
            archives = report.archives,
            "Build published"
        );
        Ok(report)
    }
}

/// Builds and caches every module archive of one tag.
///
/// Returns `None` without touching the cache once `cancelled` is set.
fn build_tag(
    store: &VersionStore,
    cache: &AssetCache,
    tag: &str,
    cancelled: &AtomicBool,
) -> Result<Option<(String, TagDigests)>> {
    if cancelled.load(Ordering::Relaxed) {
        return Ok(None);
    }
    let handle = store.checkout()?;
    let tree = handle.resolve_tag(tag)?;
    let archives = synthesize_all(&tree)?;

    if cancelled.load(Ordering::Relaxed) {
        return Ok(None);
    }
    cache.ensure_version_dir(tag)?;
    let mut digests = TagDigests::new();
    for (module, bytes) in archives {
        if cancelled.load(Ordering::Relaxed) {
            return Ok(None);
        }
        let digest = cache.write_archive(tag, &module, &bytes)?;
        digests.insert(module, digest);
    }

    tracing::info!(
        tag,
        commit = %tree.commit_id(),
        modules = digests.len(),
        "Built version"
    );
    Ok(Some((tag.to_string(), digests)))
}

fn output_parent(output: &Path) -> PathBuf {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Moves a finished staging directory to `output`, replacing any previous
/// build.
///
/// The previous build is first moved into a fresh temporary directory next
/// to `output`, so no sibling path is ever overwritten or removed.
fn publish(staging: &Path, output: &Path) -> Result<()> {
    if !output.exists() {
        return std::fs::rename(staging, output).map_err(|e| RegistryError::io(output, e));
    }

    let parent = output_parent(output);
    let retired = tempfile::Builder::new()
        .prefix(".monoreg-retired-")
        .tempdir_in(&parent)
        .map_err(|e| RegistryError::io(&parent, e))?;
    let previous = retired.path().join("previous");
    std::fs::rename(output, &previous).map_err(|e| RegistryError::io(output, e))?;

    if let Err(e) = std::fs::rename(staging, output) {
        if let Err(restore) = std::fs::rename(&previous, output) {
            tracing::warn!(
                output = %output.display(),
                error = %restore,
                "Failed to restore previous build"
            );
        }
        return Err(RegistryError::io(output, e));
    }

    retired.close().map_err(|e| RegistryError::io(&parent, e))
}
