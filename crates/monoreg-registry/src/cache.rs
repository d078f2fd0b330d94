//! On-disk asset cache of precomputed module archives.
//!
//! Layout, rooted at [`CacheConfig::dir`]:
//!
//! ```text
//! <root>/versions.json
//! <root>/<version>/<module>.tar.gz
//! ```
//!
//! Version and module names are encoded with [`sanitize_key`], which is
//! injective, so every (version, module) pair owns exactly one file.

use std::path::{Path, PathBuf};

use monoreg_core::{archive_digest, empty_archive, sanitize_key, VersionsManifest};

use crate::config::CacheConfig;
use crate::error::{RegistryError, Result};

/// File name of the Versions Manifest inside the cache root.
pub const MANIFEST_FILE: &str = "versions.json";

/// File-based store of module archives keyed by (version, module).
#[derive(Debug, Clone)]
pub struct AssetCache {
    config: CacheConfig,
}

impl AssetCache {
    /// Creates a cache rooted at the configured directory.
    ///
    /// Nothing is created on disk until something is written.
    #[must_use]
    pub const fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    /// Returns the root directory of the cache.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.dir
    }

    /// Returns the path of the Versions Manifest.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.config.dir.join(MANIFEST_FILE)
    }

    /// Returns the directory holding the archives of one version.
    #[must_use]
    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.config.dir.join(sanitize_key(version))
    }

    /// Returns the path of the archive of `module` at `version`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::PathBuf;
    /// use monoreg_registry::{AssetCache, CacheConfig};
    ///
    /// let cache = AssetCache::new(CacheConfig::new("/cache"));
    /// assert_eq!(
    ///     cache.archive_path("v1.0.0", "docker"),
    ///     PathBuf::from("/cache/v1.0.0/docker.tar.gz")
    /// );
    /// ```
    #[must_use]
    pub fn archive_path(&self, version: &str, module: &str) -> PathBuf {
        self.version_dir(version)
            .join(format!("{}.tar.gz", sanitize_key(module)))
    }

    /// Loads the Versions Manifest.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Cache`] if no manifest exists, or an I/O or
    /// JSON error if it cannot be read.
    pub fn load_manifest(&self) -> Result<VersionsManifest> {
        let path = self.manifest_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RegistryError::Cache {
                    message: format!(
                        "no versions manifest at {}; run a build first",
                        path.display()
                    ),
                });
            }
            Err(e) => return Err(RegistryError::io(path, e)),
        };

        let manifest: VersionsManifest = serde_json::from_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            versions = manifest.versions.len(),
            "Loaded versions manifest"
        );
        Ok(manifest)
    }

    /// Writes the Versions Manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be serialized or written.
    pub fn write_manifest(&self, manifest: &VersionsManifest) -> Result<()> {
        Self::create_dir(&self.config.dir)?;
        let path = self.manifest_path();
        let json = serde_json::to_string_pretty(manifest)?;
        std::fs::write(&path, json).map_err(|e| RegistryError::io(path, e))
    }

    /// Creates the directory of a version, even if it will hold no archives.
    ///
    /// The cache root must already exist; it is never recreated here.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created, including
    /// when the cache root is missing.
    pub fn ensure_version_dir(&self, version: &str) -> Result<PathBuf> {
        let dir = self.version_dir(version);
        match std::fs::create_dir(&dir) {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(dir),
            Err(e) => Err(RegistryError::io(dir, e)),
        }
    }

    /// Stores the archive of `module` at `version` and returns its digest.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the archive cannot be written or the cache
    /// root does not exist.
    pub fn write_archive(&self, version: &str, module: &str, bytes: &[u8]) -> Result<String> {
        self.ensure_version_dir(version)?;
        let path = self.archive_path(version, module);
        std::fs::write(&path, bytes).map_err(|e| RegistryError::io(&path, e))?;

        tracing::debug!(version, module, size = bytes.len(), "Cached archive");
        Ok(archive_digest(bytes))
    }

    /// Reads the archive of `module` at `version`.
    ///
    /// A version listed in `manifest` without an archive for `module` is a
    /// version at which the module does not exist, and yields an empty
    /// archive.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::UnknownVersion`] if `version` is not in the manifest
    /// - [`RegistryError::Cache`] if the manifest records an archive that is missing
    /// - [`RegistryError::ChecksumMismatch`] if verification is enabled and
    ///   the bytes do not match the recorded digest
    pub fn read_archive(
        &self,
        manifest: &VersionsManifest,
        version: &str,
        module: &str,
    ) -> Result<Vec<u8>> {
        if !manifest.contains(version) {
            return Err(RegistryError::UnknownVersion {
                version: version.to_string(),
            });
        }

        let path = self.archive_path(version, module);
        let expected = manifest.digest(version, module);

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if expected.is_some() {
                    return Err(RegistryError::Cache {
                        message: format!("archive recorded in manifest is missing: {}", path.display()),
                    });
                }
                tracing::debug!(version, module, "Module absent at version");
                return Ok(empty_archive()?);
            }
            Err(e) => return Err(RegistryError::io(path, e)),
        };

        if self.config.verify_checksums {
            if let Some(expected) = expected {
                let actual = archive_digest(&bytes);
                if actual != expected {
                    tracing::warn!(version, module, expected, actual = %actual, "Archive checksum mismatch");
                    return Err(RegistryError::ChecksumMismatch {
                        module: module.to_string(),
                        version: version.to_string(),
                        expected: expected.to_string(),
                        actual,
                    });
                }
            }
        }

        Ok(bytes)
    }

    fn create_dir(dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| RegistryError::io(dir, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_with(version: &str) -> VersionsManifest {
        VersionsManifest::new(vec![version.to_string()])
    }

    #[test]
    fn test_archive_path_sanitizes_keys() {
        let cache = AssetCache::new(CacheConfig::new("/cache"));
        assert_eq!(
            cache.archive_path("release/1.0", "docker"),
            PathBuf::from("/cache/release%2F1.0/docker.tar.gz")
        );
        assert_eq!(cache.manifest_path(), PathBuf::from("/cache/versions.json"));
    }

    #[test]
    fn test_write_then_read_archive() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(CacheConfig::new(dir.path()));
        let mut manifest = manifest_with("v1.0.0");

        let digest = cache.write_archive("v1.0.0", "docker", b"archive-bytes").unwrap();
        manifest.record_digest("v1.0.0", "docker", digest);

        let bytes = cache.read_archive(&manifest, "v1.0.0", "docker").unwrap();
        assert_eq!(bytes, b"archive-bytes");
    }

    #[test]
    fn test_read_absent_module_is_empty_archive() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(CacheConfig::new(dir.path()));
        let manifest = manifest_with("v1.0.0");

        let bytes = cache.read_archive(&manifest, "v1.0.0", "gcp").unwrap();
        assert_eq!(bytes, empty_archive().unwrap());
    }

    #[test]
    fn test_read_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(CacheConfig::new(dir.path()));
        let err = cache
            .read_archive(&manifest_with("v1.0.0"), "v2.0.0", "docker")
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_read_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(CacheConfig::new(dir.path()));
        let mut manifest = manifest_with("v1.0.0");
        let digest = cache.write_archive("v1.0.0", "docker", b"original").unwrap();
        manifest.record_digest("v1.0.0", "docker", digest);

        std::fs::write(cache.archive_path("v1.0.0", "docker"), b"tampered").unwrap();
        let err = cache.read_archive(&manifest, "v1.0.0", "docker").unwrap_err();
        assert!(matches!(err, RegistryError::ChecksumMismatch { .. }));

        let unverified = AssetCache::new(CacheConfig::new(dir.path()).with_verify_checksums(false));
        assert_eq!(
            unverified.read_archive(&manifest, "v1.0.0", "docker").unwrap(),
            b"tampered"
        );
    }

    #[test]
    fn test_read_missing_recorded_archive() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(CacheConfig::new(dir.path()));
        let mut manifest = manifest_with("v1.0.0");
        manifest.record_digest("v1.0.0", "docker", "sha256:00");

        let err = cache.read_archive(&manifest, "v1.0.0", "docker").unwrap_err();
        assert!(matches!(err, RegistryError::Cache { .. }));
    }

    #[test]
    fn test_write_archive_does_not_recreate_removed_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("staging");
        std::fs::create_dir(&root).unwrap();
        let cache = AssetCache::new(CacheConfig::new(&root));
        cache.write_archive("v1.0.0", "docker", b"first").unwrap();

        std::fs::remove_dir_all(&root).unwrap();
        let err = cache.write_archive("v1.1.0", "docker", b"late").unwrap_err();
        assert!(matches!(err, RegistryError::Io { .. }));
        assert!(!root.exists());
    }

    #[test]
    fn test_manifest_round_trip_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(CacheConfig::new(dir.path().join("assets")));
        assert!(matches!(cache.load_manifest(), Err(RegistryError::Cache { .. })));

        let manifest = manifest_with("v1.0.0");
        cache.write_manifest(&manifest).unwrap();
        assert_eq!(cache.load_manifest().unwrap(), manifest);
    }
}
