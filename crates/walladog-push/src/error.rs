//! Error types for the push registration library.
//!
//! Collaborator failures (registrar, directory) arrive as `anyhow::Error`
//! because their shape is implementation-defined; they are flattened into
//! messages here so they can cross the FFI boundary as plain strings.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for push registration.
#[derive(Debug, Error)]
pub enum PushError {
    // Construction errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Collaborator errors
    #[error("Registration failed: {message}")]
    Registration {
        message: String,
        /// Full cause chain reported by the registrar
        cause: Option<String>,
    },

    #[error("Notification directory {operation} failed: {message}")]
    Directory {
        operation: &'static str,
        message: String,
    },

    #[error("Device is not registered for push notifications")]
    NotRegistered,

    // Persistence errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Unsupported push state schema version {found} (supported up to {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for push operations.
pub type Result<T> = std::result::Result<T, PushError>;

impl From<std::io::Error> for PushError {
    fn from(err: std::io::Error) -> Self {
        PushError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for PushError {
    fn from(err: serde_json::Error) -> Self {
        PushError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for PushError {
    fn from(err: rusqlite::Error) -> Self {
        PushError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl PushError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        PushError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Wrap a messaging registrar failure.
    pub fn registration(err: anyhow::Error) -> Self {
        PushError::Registration {
            message: format!("Unable to register with messaging service. {}", err),
            cause: Some(format!("{:#}", err)),
        }
    }

    /// Wrap a notification directory failure for the named operation.
    pub fn directory(operation: &'static str, err: anyhow::Error) -> Self {
        PushError::Directory {
            operation,
            message: format!("{:#}", err),
        }
    }

    /// Check if this error should trigger a retry of the registration flow.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PushError::Registration { .. } | PushError::Directory { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PushError::Directory {
            operation: "create_endpoint",
            message: "throttled".into(),
        };
        assert_eq!(
            err.to_string(),
            "Notification directory create_endpoint failed: throttled"
        );
        assert_eq!(
            PushError::NotRegistered.to_string(),
            "Device is not registered for push notifications"
        );
    }

    #[test]
    fn test_registration_keeps_cause_chain() {
        let err = anyhow::anyhow!("null token").context("register call failed");
        let err = PushError::registration(err);
        match err {
            PushError::Registration { message, cause } => {
                assert!(message.contains("register call failed"));
                assert!(cause.unwrap().contains("null token"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_retryable_errors() {
        assert!(PushError::registration(anyhow::anyhow!("offline")).is_retryable());
        assert!(PushError::directory("subscribe", anyhow::anyhow!("503")).is_retryable());
        assert!(!PushError::NotRegistered.is_retryable());
        assert!(!PushError::Config {
            message: "Missing sender ID.".into()
        }
        .is_retryable());
    }
}
