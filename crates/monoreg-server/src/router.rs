//! Axum router and shared request state.
//!
//! `<base>` is the advertised `modules.v1` path, `/api/modules/v1` by default.
//!
//! ```text
//! /.well-known/terraform.json                        - service discovery
//! <base>/modules/:name/coder/versions                - version listing
//! <base>/modules/:name/coder/:version/download       - download location
//! /api/modules/:name?archive=tar.gz&ref=<version>    - archive bytes
//! ```

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use monoreg_registry::ArchiveSource;

use crate::config::{normalize_base_path, validate_base_path, DEFAULT_BASE_PATH};
use crate::error::ServerError;
use crate::handlers;

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    source: Arc<dyn ArchiveSource>,
    base_path: Arc<str>,
}

impl AppState {
    /// Creates the state around an archive source.
    #[must_use]
    pub fn new(source: Arc<dyn ArchiveSource>) -> Self {
        Self {
            source,
            base_path: Arc::from(DEFAULT_BASE_PATH),
        }
    }

    /// Sets the base path advertised in the discovery document and under
    /// which the protocol routes are mounted.
    ///
    /// The path is normalized as by
    /// [`ServerConfig::with_base_path`](crate::ServerConfig::with_base_path).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidBasePath`] if the path cannot be used as
    /// a route prefix.
    pub fn with_base_path(mut self, base_path: &str) -> Result<Self, ServerError> {
        let base_path = normalize_base_path(base_path);
        validate_base_path(&base_path)?;
        self.base_path = Arc::from(base_path);
        Ok(self)
    }

    /// Returns the archive source.
    #[must_use]
    pub fn source(&self) -> &dyn ArchiveSource {
        self.source.as_ref()
    }

    /// Returns the advertised base path.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}

/// Builds the complete registry router.
///
/// Only `GET` is routed; other methods on known paths get `405`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/.well-known/terraform.json", get(handlers::discovery))
        .merge(protocol_router(state.base_path()))
        .route("/api/modules/:name", get(handlers::fetch_archive))
        .layer(middleware::from_fn(trace_requests))
        .with_state(state)
}

/// Module registry protocol routes under the advertised `modules.v1` base.
fn protocol_router(base_path: &str) -> Router<AppState> {
    let base = base_path.trim_end_matches('/');
    Router::new()
        .route(
            &format!("{base}/modules/:name/coder/versions"),
            get(handlers::list_versions),
        )
        .route(
            &format!("{base}/modules/:name/coder/:version/download"),
            get(handlers::download),
        )
}

/// Logs one line per request with its status and latency.
async fn trace_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    if status.is_server_error() {
        tracing::warn!(%method, path, status = status.as_u16(), latency_ms, "Request failed");
    } else {
        tracing::info!(%method, path, status = status.as_u16(), latency_ms, "Request handled");
    }
    response
}
