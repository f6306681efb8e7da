//! Fetch error types.

use manabar_core::{FailureKind, ProviderKind, UsageFailure};
use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Credentials are missing, expired or rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The provider answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Body or reason returned by the provider.
        message: String,
    },

    /// Invalid response from the provider.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local credential file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No usage client exists for this provider.
    #[error("Usage fetching is not supported for {0}")]
    Unsupported(ProviderKind),

    /// Keychain error.
    #[error("Keychain error: {0}")]
    Keychain(#[from] KeychainError),
}

impl FetchError {
    /// Maps a non-success HTTP status to an error.
    ///
    /// 401 and 403 are treated as authentication failures.
    pub fn from_status(status: reqwest::StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match status.as_u16() {
            401 | 403 => Self::Auth(if message.is_empty() {
                format!("provider rejected credentials ({status})")
            } else {
                message
            }),
            code => Self::Api {
                status: code,
                message,
            },
        }
    }

    /// Returns true if the user must reconnect to recover.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Returns true if the error may resolve on the next poll.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<FetchError> for UsageFailure {
    fn from(err: FetchError) -> Self {
        let kind = if err.is_auth() {
            FailureKind::Auth
        } else {
            FailureKind::Connection
        };
        UsageFailure::new(kind, err.to_string())
    }
}

// ============================================================================
// Keychain Error
// ============================================================================

/// Error type for keychain operations.
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Credential not found.
    #[error("Credential not found for {service}/{account}")]
    NotFound {
        /// Service name.
        service: String,
        /// Account name.
        account: String,
    },

    /// Access denied.
    #[error("Access denied to keychain")]
    AccessDenied,

    /// Platform error.
    #[error("Platform error: {0}")]
    Platform(String),

    /// Generic error.
    #[error("Keychain error: {0}")]
    Other(String),
}

impl From<keyring::Error> for KeychainError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::NoEntry => KeychainError::NotFound {
                service: String::new(),
                account: String::new(),
            },
            keyring::Error::PlatformFailure(e) => KeychainError::Platform(e.to_string()),
            keyring::Error::NoStorageAccess(_) => KeychainError::AccessDenied,
            _ => KeychainError::Other(err.to_string()),
        }
    }
}
