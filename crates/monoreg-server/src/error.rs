//! HTTP error mapping and server errors.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use monoreg_registry::RegistryError;
use thiserror::Error;

/// Errors returned by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The client does not accept gzip-encoded responses.
    #[error("client must accept gzip encoding")]
    ClientEncodingUnsupported,

    /// A path parameter cannot be carried in a response header.
    #[error("invalid module reference: {value}")]
    InvalidReference {
        /// Offending value.
        value: String,
    },

    /// The requested version does not exist.
    #[error("{message}")]
    NotFound {
        /// Error message.
        message: String,
    },

    /// Any other failure while producing the response.
    #[error(transparent)]
    Internal(RegistryError),
}

impl ApiError {
    /// Returns the HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::ClientEncodingUnsupported | Self::InvalidReference { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        if err.is_not_found() {
            Self::NotFound {
                message: "Could not find a matching tag".to_string(),
            }
        } else {
            Self::Internal(err)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Internal(err) => {
                tracing::error!(error = %err, "Request failed");
                (status, "Internal Server Error").into_response()
            }
            other => (status, other.to_string()).into_response(),
        }
    }
}

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Listen address.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The base path cannot be mounted as a route prefix.
    #[error("invalid base path {base_path:?}: {reason}")]
    InvalidBasePath {
        /// Offending base path.
        base_path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The server loop failed.
    #[error("server error: {source}")]
    Serve {
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::ClientEncodingUnsupported.status(),
            StatusCode::BAD_REQUEST
        );

        let not_found = ApiError::from(RegistryError::UnknownVersion {
            version: "v9.0.0".to_string(),
        });
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let internal = ApiError::from(RegistryError::Cache {
            message: "broken".to_string(),
        });
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_checksum_mismatch_is_internal() {
        let err = ApiError::from(RegistryError::ChecksumMismatch {
            module: "docker".to_string(),
            version: "v1.0.0".to_string(),
            expected: "sha256:aa".to_string(),
            actual: "sha256:bb".to_string(),
        });
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
