//! Error types for asset cache, build and archive source operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while building or serving module archives.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Tag resolution or archive synthesis failed.
    #[error(transparent)]
    Core(#[from] monoreg_core::Error),

    /// The requested version is not a published version.
    #[error("Unknown version: {version}")]
    UnknownVersion {
        /// Requested version.
        version: String,
    },

    /// Cached archive does not match the digest recorded at build time.
    #[error("Checksum mismatch for {module}@{version}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Module name.
        module: String,
        /// Version.
        version: String,
        /// Digest recorded in the manifest.
        expected: String,
        /// Digest of the bytes on disk.
        actual: String,
    },

    /// Asset cache is missing or inconsistent.
    #[error("Cache operation failed: {message}")]
    Cache {
        /// Error message.
        message: String,
    },

    /// File I/O error.
    #[error("File I/O error at {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {source}")]
    Json {
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A blocking worker task panicked or was cancelled.
    #[error("Background task failed: {message}")]
    Task {
        /// Error message.
        message: String,
    },
}

impl RegistryError {
    /// Returns true if the error means the requested version does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UnknownVersion { .. } | Self::Core(monoreg_core::Error::TagNotFound { .. })
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json { source: err }
    }
}

impl From<tokio::task::JoinError> for RegistryError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unknown_version() {
        let err = RegistryError::UnknownVersion {
            version: "v9.0.0".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown version: v9.0.0");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_core_tag_not_found_is_not_found() {
        let err = RegistryError::from(monoreg_core::Error::TagNotFound {
            tag: "v1.0.0".to_string(),
        });
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Tag not found: v1.0.0");
    }

    #[test]
    fn test_error_display_checksum_mismatch() {
        let err = RegistryError::ChecksumMismatch {
            module: "docker".to_string(),
            version: "v1.0.0".to_string(),
            expected: "sha256:aa".to_string(),
            actual: "sha256:bb".to_string(),
        };
        assert!(err.to_string().contains("Checksum mismatch for docker@v1.0.0"));
        assert!(!err.is_not_found());
    }
}
