//! The Versions Manifest.
//!
//! The manifest lists every published version. A build pass writes it once
//! next to the archives it produced, together with the digest of each
//! archive, and the server reads it back to answer version listings.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serialized list of all known versions.
///
/// # Examples
///
/// ```rust
/// use monoreg_core::VersionsManifest;
///
/// let mut manifest = VersionsManifest::new(vec!["v1.0.0".to_string()]);
/// manifest.record_digest("v1.0.0", "docker", "sha256:abc");
/// assert!(manifest.contains("v1.0.0"));
/// assert_eq!(manifest.digest("v1.0.0", "docker"), Some("sha256:abc"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionsManifest {
    /// Version tags, sorted byte-wise.
    pub versions: Vec<String>,

    /// When the manifest was generated.
    pub generated_at: DateTime<Utc>,

    /// Archive digests by version, then module.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub digests: BTreeMap<String, BTreeMap<String, String>>,
}

impl VersionsManifest {
    /// Creates a manifest for the given versions, stamped with the current time.
    #[must_use]
    pub fn new(versions: Vec<String>) -> Self {
        Self {
            versions,
            generated_at: Utc::now(),
            digests: BTreeMap::new(),
        }
    }

    /// Returns true if `version` is listed.
    #[must_use]
    pub fn contains(&self, version: &str) -> bool {
        self.versions.iter().any(|v| v == version)
    }

    /// Returns the modules that have an archive at `version`.
    pub fn modules(&self, version: &str) -> impl Iterator<Item = &str> {
        self.digests
            .get(version)
            .into_iter()
            .flat_map(|modules| modules.keys().map(String::as_str))
    }

    /// Records the digest of the archive of `module` at `version`.
    pub fn record_digest(
        &mut self,
        version: impl Into<String>,
        module: impl Into<String>,
        digest: impl Into<String>,
    ) {
        self.digests
            .entry(version.into())
            .or_default()
            .insert(module.into(), digest.into());
    }

    /// Returns the recorded digest of the archive of `module` at `version`.
    #[must_use]
    pub fn digest(&self, version: &str, module: &str) -> Option<&str> {
        self.digests
            .get(version)
            .and_then(|modules| modules.get(module))
            .map(String::as_str)
    }

    /// Returns the total number of archives recorded.
    #[must_use]
    pub fn archive_count(&self) -> usize {
        self.digests.values().map(BTreeMap::len).sum()
    }
}
