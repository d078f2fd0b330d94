//! Configuration types for the asset cache and the build pass.

use std::path::PathBuf;

/// Default asset cache directory, relative to the working directory.
pub const DEFAULT_ASSETS_DIR: &str = "assets";

/// Configuration for the on-disk asset cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory holding `versions.json` and one directory per version.
    pub dir: PathBuf,

    /// Verify archive digests against the manifest on every read.
    pub verify_checksums: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_ASSETS_DIR),
            verify_checksums: true,
        }
    }
}

impl CacheConfig {
    /// Creates a new cache configuration with the given directory.
    ///
    /// # Examples
    ///
    /// ```
    /// use monoreg_registry::CacheConfig;
    ///
    /// let config = CacheConfig::new("/var/lib/monoreg").with_verify_checksums(false);
    /// assert!(!config.verify_checksums);
    /// ```
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Enables or disables checksum verification.
    #[must_use]
    pub const fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }
}

/// Configuration for an offline build pass.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory the finished asset cache is published to.
    pub output: PathBuf,

    /// Number of tags processed concurrently.
    pub jobs: usize,
}

impl BuildConfig {
    /// Creates a build configuration publishing to `output`.
    #[must_use]
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            jobs: default_jobs(),
        }
    }

    /// Sets the number of tags processed concurrently (at least one).
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ASSETS_DIR)
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}
