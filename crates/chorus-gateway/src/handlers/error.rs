//! Handler error types

use crate::protocol::FrameError;
use thiserror::Error;

/// Handler error type
///
/// Handler failures are logged by the router; they never close the connection.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Event payload did not have the expected shape
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] FrameError),

    /// Failure reported by an event handler
    #[error("Handler failed: {0}")]
    Failed(String),

    /// Internal error
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
