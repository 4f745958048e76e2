//! Centralized error types for cligate
//!
//! Library code returns [`GatewayError`] through the [`Result`] alias.
//! The binary and the config loader wrap these with `anyhow` for context.

use thiserror::Error;

/// Global error type for session engine operations
#[derive(Error, Debug)]
pub enum GatewayError {
    /// A write that requires an existing session found none
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// Storage backend failures
    #[error("Storage backend error ({backend}): {message}")]
    Storage { backend: String, message: String },

    /// Invalid caller input
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl GatewayError {
    /// Create a session-not-found error
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }

    /// Create a storage backend error
    pub fn storage(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns true if the system can keep serving after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The caller recreates the session on its next request
            GatewayError::SessionNotFound { .. } => true,
            GatewayError::Storage { .. } => true,
            GatewayError::InvalidInput { .. } => true,
            GatewayError::Serialization { .. } => false,
            GatewayError::Config { .. } => false,
        }
    }

    /// Returns the level this error should be logged at
    pub fn severity(&self) -> tracing::Level {
        match self {
            GatewayError::Config { .. } => tracing::Level::ERROR,
            GatewayError::Serialization { .. } => tracing::Level::ERROR,
            GatewayError::Storage { .. } => tracing::Level::WARN,
            GatewayError::SessionNotFound { .. } => tracing::Level::INFO,
            GatewayError::InvalidInput { .. } => tracing::Level::INFO,
        }
    }
}

/// Result type alias using GatewayError
pub type Result<T> = std::result::Result<T, GatewayError>;

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}
