//! Error types for parley
//!
//! Provides a unified error type used across all parley crates.

use std::path::PathBuf;

/// Main error type for parley operations
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Connection Errors ===

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No reply from server within {waited:?}")]
    Timeout { waited: std::time::Duration },

    #[error("Connection closed")]
    ConnectionClosed,

    // === Protocol Errors ===

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a timeout error from the wait that expired
    pub fn timeout(waited: std::time::Duration) -> Self {
        Self::Timeout { waited }
    }

    /// Check if this error is retryable
    ///
    /// A timed out command leaves the client usable, so the caller may try
    /// again. Everything else needs a new connection or a fixed request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type alias using ParleyError
pub type Result<T> = std::result::Result<T, ParleyError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // ==================== Display Tests ====================

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ParleyError::Io(io_err);
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
        let err = ParleyError::FileRead {
            path: PathBuf::from("/etc/shadow"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/etc/shadow"));
    }

    #[test]
    fn test_error_display_transport() {
        let err = ParleyError::transport("unsupported transport kind");
        assert_eq!(err.to_string(), "Transport error: unsupported transport kind");
    }

    #[test]
    fn test_error_display_timeout() {
        let err = ParleyError::timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "No reply from server within 5s");
    }

    #[test]
    fn test_error_display_connection_closed() {
        assert_eq!(ParleyError::ConnectionClosed.to_string(), "Connection closed");
    }

    #[test]
    fn test_error_display_invalid_response() {
        let err = ParleyError::invalid_response("expected \"OK!\", got \"ERROR 1 nope\"");
        assert_eq!(
            err.to_string(),
            "Invalid response: expected \"OK!\", got \"ERROR 1 nope\""
        );
    }

    #[test]
    fn test_error_display_config_invalid() {
        let err = ParleyError::ConfigInvalid {
            path: PathBuf::from("/home/user/.config/parley/config.toml"),
            message: "syntax error".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Invalid configuration"));
        assert!(msg.contains("config.toml"));
        assert!(msg.contains("syntax error"));
    }

    // ==================== Helper Tests ====================

    #[test]
    fn test_timeout_helper() {
        let err = ParleyError::timeout(Duration::from_millis(5_300));
        assert!(matches!(err, ParleyError::Timeout { waited } if waited == Duration::from_millis(5_300)));
    }

    #[test]
    fn test_sub_second_timeout_display() {
        let err = ParleyError::timeout(Duration::from_millis(300));
        assert_eq!(err.to_string(), "No reply from server within 300ms");
    }

    #[test]
    fn test_protocol_helper() {
        let err = ParleyError::protocol("bad header");
        assert!(matches!(err, ParleyError::Protocol(_)));
        assert_eq!(err.to_string(), "Protocol error: bad header");
    }

    #[test]
    fn test_config_helper() {
        let err = ParleyError::config("missing key");
        assert_eq!(err.to_string(), "Configuration error: missing key");
    }

    #[test]
    fn test_internal_helper() {
        let err = ParleyError::internal("lock poisoned");
        assert_eq!(err.to_string(), "Internal error: lock poisoned");
    }

    // ==================== Retryable Tests ====================

    #[test]
    fn test_retryable() {
        assert!(ParleyError::timeout(Duration::from_secs(5)).is_retryable());
    }

    #[test]
    fn test_not_retryable_errors() {
        let non_retryable = [
            ParleyError::ConnectionClosed,
            ParleyError::transport("x"),
            ParleyError::invalid_response("x"),
            ParleyError::protocol("x"),
            ParleyError::config("x"),
            ParleyError::internal("x"),
        ];

        for err in non_retryable {
            assert!(!err.is_retryable(), "Expected {:?} to NOT be retryable", err);
        }
    }

    // ==================== From Trait Tests ====================

    #[test]
    fn test_from_io_error_preserves_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: ParleyError = io_err.into();
        if let ParleyError::Io(inner) = err {
            assert_eq!(inner.kind(), std::io::ErrorKind::ConnectionReset);
        } else {
            panic!("Expected Io variant");
        }
    }
}
