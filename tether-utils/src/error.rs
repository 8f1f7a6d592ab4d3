//! Error types for tether
//!
//! Provides a unified error type used across all tether crates.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use tether_protocol::CodecError;

/// Machine-readable code for responses that do not have the expected shape
pub const BAD_RESPONSE: &str = "BAD_RESPONSE";

/// Main error type for tether operations
#[derive(Debug, thiserror::Error)]
pub enum TetherError {
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

    // === Discovery Errors ===

    #[error("Discovery failed: {0}")]
    Discovery(String),

    // === Connection Errors ===

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Connection closed")]
    ConnectionClosed,

    // === Protocol Errors ===

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("BAD_RESPONSE: {message}")]
    BadResponse { message: String, payload: Value },

    // === Counterpart Errors ===

    #[error("{code}: {message}")]
    Remote {
        code: String,
        message: String,
        data: Option<Value>,
    },

    #[error("typed call failed: {code}: {message}")]
    TypedCall {
        code: String,
        message: String,
        data: Option<Value>,
    },

    // === Timeouts ===

    #[error("Timed out after {after:?} waiting for {operation}")]
    Timeout { operation: String, after: Duration },

    // === Caller Errors ===

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TetherError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a discovery error
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a bad-response error carrying the offending payload
    pub fn bad_response(msg: impl Into<String>, payload: Value) -> Self {
        Self::BadResponse {
            message: msg.into(),
            payload,
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Create an invalid-argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Turn a plain counterpart failure into the typed-call variant
    pub fn into_typed(self) -> Self {
        match self {
            Self::Remote { code, message, data } => Self::TypedCall { code, message, data },
            other => other,
        }
    }

    /// Machine-readable code for counterpart and bad-response errors
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Remote { code, .. } | Self::TypedCall { code, .. } => Some(code),
            Self::BadResponse { .. } => Some(BAD_RESPONSE),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }

    /// Whether the session that produced this error is no longer usable
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::Connection(_) | Self::Codec(_) | Self::Io(_)
        )
    }
}

/// Result type alias using TetherError
pub type Result<T> = std::result::Result<T, TetherError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ==================== Display Tests ====================

    #[test]
    fn test_error_display_connection() {
        let err = TetherError::Connection("refused".into());
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_error_display_connection_closed() {
        assert_eq!(TetherError::ConnectionClosed.to_string(), "Connection closed");
    }

    #[test]
    fn test_error_display_remote() {
        let err = TetherError::Remote {
            code: "UNAUTHORIZED".into(),
            message: "bad token".into(),
            data: None,
        };
        assert_eq!(err.to_string(), "UNAUTHORIZED: bad token");
    }

    #[test]
    fn test_error_display_timeout() {
        let err = TetherError::timeout("request ping", Duration::from_millis(1500));
        let msg = err.to_string();
        assert!(msg.contains("request ping"));
        assert!(msg.contains("1.5s"));
    }

    #[test]
    fn test_error_display_bad_response() {
        let err = TetherError::bad_response("Expected object result", json!([1]));
        assert_eq!(err.to_string(), "BAD_RESPONSE: Expected object result");
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
        let err = TetherError::FileRead {
            path: PathBuf::from("/etc/bridge-info.json"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/etc/bridge-info.json"));
    }

    // ==================== Classification Tests ====================

    #[test]
    fn test_into_typed_converts_remote() {
        let err = TetherError::Remote {
            code: "API_METHOD_NOT_FOUND".into(),
            message: "No matching method".into(),
            data: Some(json!({"method": "nope"})),
        }
        .into_typed();

        match err {
            TetherError::TypedCall { code, data, .. } => {
                assert_eq!(code, "API_METHOD_NOT_FOUND");
                assert_eq!(data, Some(json!({"method": "nope"})));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_into_typed_keeps_other_errors() {
        let err = TetherError::ConnectionClosed.into_typed();
        assert!(err.is_closed());
    }

    #[test]
    fn test_code() {
        let remote = TetherError::Remote {
            code: "X".into(),
            message: "y".into(),
            data: None,
        };
        assert_eq!(remote.code(), Some("X"));
        assert_eq!(
            TetherError::bad_response("m", Value::Null).code(),
            Some(BAD_RESPONSE)
        );
        assert_eq!(TetherError::ConnectionClosed.code(), None);
    }

    #[test]
    fn test_timeout_distinct_from_closed() {
        let timeout = TetherError::timeout("event", Duration::from_secs(1));
        assert!(timeout.is_timeout());
        assert!(!timeout.is_closed());
        assert!(!timeout.is_fatal());
        assert!(TetherError::ConnectionClosed.is_fatal());
    }

    #[test]
    fn test_from_codec_error() {
        let err: TetherError = CodecError::NotAnObject.into();
        assert!(matches!(err, TetherError::Codec(_)));
        assert!(err.is_fatal());
    }
}
