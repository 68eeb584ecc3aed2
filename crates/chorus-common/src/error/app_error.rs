//! Application error types
//!
//! Unified error handling for startup and supervision.

use crate::config::ConfigError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Startup errors
    #[error("No credential supplied; set CHORUS_TOKEN")]
    MissingCredential,

    #[error("Credential rejected by the remote service (unauthorized)")]
    Unauthorized,

    // Collaborator errors
    #[error("REST error: {0}")]
    Rest(String),

    #[error("Transport error: {0}")]
    Transport(String),

    // Supervision errors
    #[error("Gave up after {attempts} restart attempts: {last}")]
    RestartsExhausted { attempts: u32, last: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    /// Check if this error must abort startup instead of being retried
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential | Self::Unauthorized | Self::Config(_)
        )
    }

    /// Get a stable error code for logs
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "MISSING_CREDENTIAL",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Rest(_) => "REST_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::RestartsExhausted { .. } => "RESTARTS_EXHAUSTED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::MissingVar("CHORUS_TOKEN") => Self::MissingCredential,
            other => Self::Config(other.to_string()),
        }
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
