//! Core error types for `ManaBar`.

use thiserror::Error;

use crate::models::{ProviderKind, UsageShape};

/// Core error type for `ManaBar` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Caller supplied an out-of-range or unknown value.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Raw payload shape does not match the provider's declared usage shape.
    ///
    /// This is an integration bug, not a transient fault.
    #[error("Normalization error for {provider}: expected {expected} payload, got {found}")]
    Normalization {
        /// Provider whose payload was rejected.
        provider: ProviderKind,
        /// Shape the provider family declares.
        expected: UsageShape,
        /// Shape the payload actually had.
        found: String,
    },
}

impl CoreError {
    /// Returns true if this is a caller validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a payload shape mismatch.
    pub fn is_normalization(&self) -> bool {
        matches!(self, Self::Normalization { .. })
    }
}
