//! Error types for tag resolution and archive synthesis.
//!
//! This module defines the error types used throughout the `monoreg-core` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading history or building archives.
#[derive(Error, Debug)]
pub enum Error {
    /// The path is not a git repository, or the repository could not be opened.
    #[error("Failed to open repository at {path}: {source}")]
    RepositoryOpen {
        /// Repository path or clone URL.
        path: PathBuf,
        /// Underlying git error.
        #[source]
        source: git2::Error,
    },

    /// No tag with the given name exists.
    #[error("Tag not found: {tag}")]
    TagNotFound {
        /// Requested tag name.
        tag: String,
    },

    /// The tag exists but its target commit could not be loaded.
    #[error("Failed to resolve commit for tag {tag}: {message}")]
    CommitResolution {
        /// Tag name.
        tag: String,
        /// Description of the failure.
        message: String,
    },

    /// A tree or blob reachable from a commit could not be read.
    #[error("Failed to read {path} from tree: {message}")]
    TreeRead {
        /// Repository-relative path being read (empty for the root tree).
        path: String,
        /// Description of the failure.
        message: String,
    },

    /// Writing an archive to its output sink failed.
    #[error("Failed to write archive for module {module}: {source}")]
    ArchiveWrite {
        /// Module being archived.
        module: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Returns true if this error means the requested tag does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::TagNotFound { .. })
    }

    pub(crate) fn tree_read(path: impl Into<String>, err: &git2::Error) -> Self {
        Self::TreeRead {
            path: path.into(),
            message: err.message().to_string(),
        }
    }
}
