//! Configuration for the registry server.

use std::net::SocketAddr;

use crate::error::ServerError;

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Default path advertised for the `modules.v1` service.
pub const DEFAULT_BASE_PATH: &str = "/api/modules/v1";

/// Configuration for the registry HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: SocketAddr,

    /// Base path advertised in the discovery document.
    pub base_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            base_path: DEFAULT_BASE_PATH.to_string(),
        }
    }
}

impl ServerConfig {
    /// Creates a configuration listening on `bind`.
    #[must_use]
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            ..Default::default()
        }
    }

    /// Sets the base path advertised in the discovery document.
    ///
    /// A leading slash is added and a trailing slash removed. The result is
    /// checked by [`ServerConfig::validate`].
    ///
    /// # Examples
    ///
    /// ```
    /// use monoreg_server::ServerConfig;
    ///
    /// let config = ServerConfig::default().with_base_path("registry/modules/");
    /// assert_eq!(config.base_path, "/registry/modules");
    /// ```
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = normalize_base_path(&base_path.into());
        self
    }

    /// Checks that the configuration can be served.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidBasePath`] if the base path contains a
    /// character reserved by the router (`:`, `*`, `{`, `}`), a query or
    /// fragment marker, whitespace, or an empty segment.
    pub fn validate(&self) -> Result<(), ServerError> {
        validate_base_path(&self.base_path)
    }
}

/// Returns `base_path` with exactly one leading slash and no trailing slash.
pub(crate) fn normalize_base_path(base_path: &str) -> String {
    format!("/{}", base_path.trim().trim_matches('/'))
}

pub(crate) fn validate_base_path(base_path: &str) -> Result<(), ServerError> {
    let reserved = base_path.chars().find(|c| {
        matches!(c, ':' | '*' | '{' | '}' | '?' | '#') || c.is_whitespace() || c.is_control()
    });
    let reason = if let Some(c) = reserved {
        format!("reserved character {c:?}")
    } else if !base_path.starts_with('/') {
        "must start with '/'".to_string()
    } else if base_path.contains("//") {
        "empty path segment".to_string()
    } else {
        return Ok(());
    };
    Err(ServerError::InvalidBasePath {
        base_path: base_path.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_constants() {
        let config = ServerConfig::default();
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert_eq!(config.base_path, DEFAULT_BASE_PATH);
    }

    #[test]
    fn test_base_path_root_is_kept() {
        let config = ServerConfig::default().with_base_path("/");
        assert_eq!(config.base_path, "/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_path_gets_leading_slash() {
        let config = ServerConfig::default().with_base_path("registry/v1");
        assert_eq!(config.base_path, "/registry/v1");
        assert!(config.validate().is_ok());

        let config = ServerConfig::default().with_base_path("");
        assert_eq!(config.base_path, "/");
    }

    #[test]
    fn test_base_path_with_route_syntax_is_rejected() {
        for base_path in ["/registry/:v1", "/registry/*rest", "/{v1}", "/a b", "/a//b"] {
            let config = ServerConfig::default().with_base_path(base_path);
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err, ServerError::InvalidBasePath { .. }),
                "{base_path} should be rejected"
            );
        }
    }

    #[test]
    fn test_unnormalized_field_is_rejected() {
        let config = ServerConfig {
            base_path: "registry".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
