//! # monoreg Registry
//!
//! Archive sources for the monoreg module registry.
//!
//! This crate decides where archive bytes come from:
//!
//! - [`OnDemandSource`] - synthesize from the repository on every request
//! - [`PrecomputedSource`] - serve from an [`AssetCache`] filled by a [`BuildPass`]
//!
//! Both implement [`ArchiveSource`], which is all the HTTP layer sees.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use monoreg_core::VersionStore;
//! use monoreg_registry::{BuildConfig, BuildPass};
//!
//! # async fn example() -> monoreg_registry::Result<()> {
//! let store = Arc::new(VersionStore::open("/srv/modules")?);
//! let report = BuildPass::new(store, BuildConfig::new("assets").with_jobs(4))
//!     .run()
//!     .await?;
//! println!("{} archives", report.archives);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod build;
pub mod cache;
pub mod config;
pub mod error;
pub mod source;

pub use build::{BuildPass, BuildReport};
pub use cache::{AssetCache, MANIFEST_FILE};
pub use config::{BuildConfig, CacheConfig, DEFAULT_ASSETS_DIR};
pub use error::{RegistryError, Result};
pub use source::{ArchiveSource, OnDemandSource, PrecomputedSource};
