//! Error types for the common library.
//!
//! This module provides a unified error hierarchy using `thiserror` so that
//! handlers and backends report failures the same way.
//!
//! # Error Categories
//!
//! - `ConfigError`: Missing, unreadable, or invalid configuration
//! - `Error::Api`: HTTP API errors (includes endpoint and status)
//! - `Error::Validation`: Tool input rejected before any side effect
//! - `Error::Backend`: The image backend could not be used (missing CLI, bad exit)
//! - `Error::Io`: File system operations
//! - `Error::Timeout`: Subprocess or request timeouts

use thiserror::Error;

/// Unified error type for the common library.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors (unreadable file, invalid values)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// API errors with endpoint and HTTP status context
    #[error("API error for {endpoint} (HTTP {status_code}): {message}")]
    Api {
        /// The API endpoint that was called
        endpoint: String,
        /// HTTP status code returned by the API (0 when no response was received)
        status_code: u16,
        /// Error message from the API or describing the failure
        message: String,
    },

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backend setup or invocation errors
    #[error("Backend error: {0}")]
    Backend(String),

    /// File system I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Operation timeout errors
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),
}

impl Error {
    /// Create a new API error with endpoint, status code, and message.
    ///
    /// # Example
    ///
    /// ```
    /// use pixelforge_mcp_common::error::Error;
    ///
    /// let err = Error::api(
    ///     "https://generativelanguage.googleapis.com/v1beta/models/x:generateContent",
    ///     400,
    ///     "API key not valid"
    /// );
    /// assert!(err.to_string().contains("400"));
    /// assert!(err.to_string().contains("API key not valid"));
    /// ```
    pub fn api(endpoint: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        Error::Api {
            endpoint: endpoint.into(),
            status_code,
            message: message.into(),
        }
    }

    /// Create a new validation error.
    ///
    /// # Example
    ///
    /// ```
    /// use pixelforge_mcp_common::error::Error;
    ///
    /// let err = Error::validation("Prompt cannot be empty");
    /// assert!(err.to_string().contains("Prompt cannot be empty"));
    /// ```
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Create a new backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend(message.into())
    }

    /// Create a new timeout error.
    pub fn timeout(seconds: u64) -> Self {
        Error::Timeout(seconds)
    }

    /// Returns true if this error was raised by input validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

/// Configuration errors.
///
/// These errors occur when loading, validating, or saving the YAML
/// configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration field has an invalid value
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    /// The configuration file could not be parsed or serialized
    #[error("Failed to parse configuration file {path}: {message}")]
    Parse {
        /// Path of the configuration file
        path: String,
        /// Parser error message
        message: String,
    },

    /// The configuration file could not be read or written
    #[error("Failed to access configuration file {path}: {source}")]
    Io {
        /// Path of the configuration file
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Create a new invalid value error.
    pub fn invalid_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue(name.into(), reason.into())
    }

    /// Create a new parse error for the given file.
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error for the given file.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using the unified Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_includes_endpoint_and_status() {
        let err = Error::api("https://example.test/v1beta/models/m:generateContent", 500, "Internal error");
        let msg = err.to_string();
        assert!(msg.contains("example.test"), "Should contain endpoint");
        assert!(msg.contains("500"), "Should contain status code");
        assert!(msg.contains("Internal error"), "Should contain message");
    }

    #[test]
    fn test_config_error_includes_field_name() {
        let err = ConfigError::invalid_value("imagen.default_temperature", "must be between 0 and 1");
        let msg = err.to_string();
        assert!(msg.contains("imagen.default_temperature"));
        assert!(msg.contains("between 0 and 1"));
    }

    #[test]
    fn test_error_from_config_error() {
        let config_err = ConfigError::parse("config/config.yaml", "bad indentation");
        let err: Error = config_err.into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("config/config.yaml"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_timeout_error() {
        let err = Error::timeout(120);
        let msg = err.to_string();
        assert!(msg.contains("120"));
        assert!(msg.contains("seconds"));
    }

    #[test]
    fn test_validation_error() {
        let err = Error::validation("Prompt too long (max 2000 characters)");
        assert!(err.is_validation());
        assert!(err.to_string().contains("Prompt too long"));
        assert!(!Error::backend("missing").is_validation());
    }
}
