//! Archive sources: where the server gets versions and archive bytes from.
//!
//! Two strategies are available and one is chosen at startup:
//!
//! - [`OnDemandSource`] resolves the tag and synthesizes the archive on every
//!   request, directly from the repository.
//! - [`PrecomputedSource`] serves archives written ahead of time by a
//!   [`BuildPass`](crate::BuildPass).
//!
//! Both go through the same synthesis path and produce identical bytes for
//! the same (module, version).

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use monoreg_core::{synthesize, VersionStore, VersionsManifest};

use crate::cache::AssetCache;
use crate::config::CacheConfig;
use crate::error::Result;

/// Provider of published versions and module archives.
#[async_trait]
pub trait ArchiveSource: Send + Sync + Debug {
    /// Returns every published version, sorted byte-wise.
    async fn versions(&self) -> Result<Vec<String>>;

    /// Returns the archive of `module` at `version`.
    ///
    /// A module that does not exist at `version` yields an empty archive.
    /// An unknown version is an error for which
    /// [`RegistryError::is_not_found`](crate::RegistryError::is_not_found)
    /// is true.
    async fn archive(&self, module: &str, version: &str) -> Result<Vec<u8>>;

    /// Returns a short name of the strategy, for logging.
    fn strategy(&self) -> &'static str;
}

/// Synthesizes archives per request from a live repository.
#[derive(Debug, Clone)]
pub struct OnDemandSource {
    store: Arc<VersionStore>,
}

impl OnDemandSource {
    /// Creates a source reading from `store`.
    #[must_use]
    pub const fn new(store: Arc<VersionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ArchiveSource for OnDemandSource {
    async fn versions(&self) -> Result<Vec<String>> {
        let store = Arc::clone(&self.store);
        Ok(tokio::task::spawn_blocking(move || store.list_tags()).await??)
    }

    async fn archive(&self, module: &str, version: &str) -> Result<Vec<u8>> {
        let store = Arc::clone(&self.store);
        let module = module.to_string();
        let version = version.to_string();

        let bytes = tokio::task::spawn_blocking(move || {
            let handle = store.checkout()?;
            let tree = handle.resolve_tag(&version)?;
            tracing::debug!(
                module = %module,
                version = %version,
                commit = %tree.commit_id(),
                "Synthesizing archive"
            );
            synthesize(&tree, &module)
        })
        .await??;

        Ok(bytes)
    }

    fn strategy(&self) -> &'static str {
        "on-demand"
    }
}

/// Serves archives from an asset cache written by a build pass.
///
/// The Versions Manifest is read once, when the source is opened.
#[derive(Debug)]
pub struct PrecomputedSource {
    cache: Arc<AssetCache>,
    manifest: Arc<VersionsManifest>,
}

impl PrecomputedSource {
    /// Opens the asset cache described by `config` and loads its manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest is missing or unreadable.
    pub fn open(config: CacheConfig) -> Result<Self> {
        let cache = AssetCache::new(config);
        let manifest = cache.load_manifest()?;

        tracing::info!(
            root = %cache.root().display(),
            versions = manifest.versions.len(),
            archives = manifest.archive_count(),
            generated_at = %manifest.generated_at,
            "Opened asset cache"
        );

        Ok(Self {
            cache: Arc::new(cache),
            manifest: Arc::new(manifest),
        })
    }
}

#[async_trait]
impl ArchiveSource for PrecomputedSource {
    async fn versions(&self) -> Result<Vec<String>> {
        Ok(self.manifest.versions.clone())
    }

    async fn archive(&self, module: &str, version: &str) -> Result<Vec<u8>> {
        let cache = Arc::clone(&self.cache);
        let manifest = Arc::clone(&self.manifest);
        let module = module.to_string();
        let version = version.to_string();

        tokio::task::spawn_blocking(move || cache.read_archive(&manifest, &version, &module))
            .await?
    }

    fn strategy(&self) -> &'static str {
        "precomputed"
    }
}
