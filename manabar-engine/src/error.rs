//! Engine error types.

use manabar_core::CoreError;
use manabar_fetch::KeychainError;
use thiserror::Error;

/// Errors returned by engine operations.
///
/// Fetch and persistence failures never surface here: they are recorded in
/// provider status or logged.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid input from the caller.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Credential store failure.
    #[error("Credential error: {0}")]
    Credential(#[from] KeychainError),
}

impl EngineError {
    /// Returns true if the caller passed invalid input.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::Validation(msg),
            other => Self::Validation(other.to_string()),
        }
    }
}

/// Error reported by a tray or notification collaborator.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The tray or notification center is not available.
    #[error("Notifier unavailable: {0}")]
    Unavailable(String),

    /// Delivery failed.
    #[error("Notification failed: {0}")]
    Failed(String),
}
