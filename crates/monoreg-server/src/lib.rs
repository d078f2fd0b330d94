//! # monoreg Server
//!
//! HTTP surface of the monoreg module registry: the Terraform module
//! registry protocol (service discovery, version listing, download
//! location) plus the endpoint that serves module archives.
//!
//! Archives come from any [`ArchiveSource`](monoreg_registry::ArchiveSource);
//! the server never touches git or the asset cache directly.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use monoreg_core::VersionStore;
//! use monoreg_registry::OnDemandSource;
//! use monoreg_server::{serve, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(VersionStore::open("/srv/modules")?);
//! let source = Arc::new(OnDemandSource::new(store));
//! serve(ServerConfig::default(), source).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod router;
pub mod server;

pub use config::{ServerConfig, DEFAULT_BASE_PATH, DEFAULT_BIND};
pub use error::{ApiError, ServerError};
pub use router::{build_router, AppState};
pub use server::{serve, serve_with_shutdown, shutdown_signal};
