//! Listener setup and graceful shutdown.

use std::future::Future;
use std::sync::Arc;

use monoreg_registry::ArchiveSource;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::router::{build_router, AppState};

/// Serves the registry until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the base path is invalid, the address cannot be
/// bound, or the server fails.
pub async fn serve(config: ServerConfig, source: Arc<dyn ArchiveSource>) -> Result<(), ServerError> {
    serve_with_shutdown(config, source, shutdown_signal()).await
}

/// Serves the registry until `shutdown` completes.
///
/// In-flight requests are allowed to finish.
///
/// # Errors
///
/// Returns an error if the base path is invalid, the address cannot be
/// bound, or the server fails.
pub async fn serve_with_shutdown<F>(
    config: ServerConfig,
    source: Arc<dyn ArchiveSource>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let strategy = source.strategy();
    let state = AppState::new(source).with_base_path(&config.base_path)?;
    let app = build_router(state);

    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind,
            source,
        })?;
    let local = listener.local_addr().map_err(|source| ServerError::Bind {
        addr: config.bind,
        source,
    })?;

    tracing::info!(
        addr = %local,
        base_path = %config.base_path,
        strategy,
        "Registry listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|source| ServerError::Serve { source })?;

    tracing::info!("Registry stopped");
    Ok(())
}

/// Completes on SIGINT or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
