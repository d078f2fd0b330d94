//! # monoreg Core
//!
//! Tag resolution and module archive synthesis for the monoreg module
//! registry.
//!
//! Modules live as top-level directories of a single git monorepo and every
//! tag is a release. This crate turns a tag name into the tree of the commit
//! it marks, partitions that tree by module and writes one deterministic
//! `tar.gz` archive per module:
//!
//! - [`VersionStore`] - read-only tag enumeration and tag → tree resolution
//! - [`partition_by_module`] - grouping of tree files by top-level directory
//! - [`ArchiveWriter`], [`build_archive`], [`synthesize`] - archive synthesis
//! - [`VersionsManifest`] - the list of published versions
//!
//! ## Example
//!
//! ```rust,no_run
//! use monoreg_core::{synthesize, VersionStore};
//!
//! let store = VersionStore::open("/srv/modules")?;
//! let handle = store.checkout()?;
//! let tree = handle.resolve_tag("v1.0.0")?;
//! let archive = synthesize(&tree, "docker")?;
//! std::fs::write("docker.tar.gz", archive).expect("write archive");
//! # Ok::<(), monoreg_core::Error>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod archive;
pub mod error;
pub mod manifest;
pub mod module;
pub mod store;
pub mod version;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use archive::{
    archive_digest, build_archive, empty_archive, synthesize, synthesize_all, ArchiveWriter,
};
pub use error::{Error, Result};
pub use manifest::VersionsManifest;
pub use module::{module_files, module_of, partition_by_module};
pub use store::{FileEntry, Files, ResolvedTree, StoreHandle, VersionStore};
pub use version::{normalize_ref, sanitize_key, MAINLINE_REF, VERSION_PREFIX};
