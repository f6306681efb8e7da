//! Per-provider status types.
//!
//! - [`ProviderStatus`] - Connection state plus the latest normalized usage
//! - [`UsageFailure`] - A classified fetch/normalization failure
//! - [`FailureKind`] - Failure classification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::provider::ProviderKind;
use super::usage::{NormalizedUsage, UtilizationWindow};
use crate::error::CoreError;

// ============================================================================
// Failures
// ============================================================================

/// Classification of a failed poll for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Backend unreachable or transport-level failure.
    Connection,
    /// Credentials missing, invalid or expired.
    Auth,
    /// Payload did not match the provider's usage shape.
    Normalization,
}

/// A failure recorded into a provider's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageFailure {
    /// What went wrong.
    pub kind: FailureKind,
    /// Human-readable message.
    pub message: String,
}

impl UsageFailure {
    /// Creates a new failure.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<CoreError> for UsageFailure {
    fn from(err: CoreError) -> Self {
        let kind = if err.is_normalization() {
            FailureKind::Normalization
        } else {
            FailureKind::Connection
        };
        Self::new(kind, err.to_string())
    }
}

// ============================================================================
// Provider Status
// ============================================================================

/// Current state of one enabled provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    /// Provider this status belongs to.
    pub provider_id: ProviderKind,
    /// Whether the last poll succeeded.
    pub connected: bool,
    /// Message of the last failure, cleared on success.
    pub error: Option<String>,
    /// Classification of the last failure.
    pub error_kind: Option<FailureKind>,
    /// Latest normalized usage. Kept across failures.
    pub usage: Option<NormalizedUsage>,
    /// When usage was last replaced. `None` until the first successful poll.
    pub last_updated: Option<DateTime<Utc>>,
}

impl ProviderStatus {
    /// Creates the status of a provider that has never been polled.
    pub fn unconfigured(provider_id: ProviderKind) -> Self {
        Self {
            provider_id,
            connected: false,
            error: None,
            error_kind: None,
            usage: None,
            last_updated: None,
        }
    }

    /// Returns true if no poll has ever completed for this provider.
    pub fn is_unconfigured(&self) -> bool {
        !self.connected && self.error.is_none() && self.last_updated.is_none()
    }

    /// Returns true if the last failure was an authentication error.
    pub fn needs_reconnect(&self) -> bool {
        self.error_kind == Some(FailureKind::Auth)
    }

    /// Returns the latest utilization window, if the provider reports one.
    pub fn utilization_window(&self) -> Option<&UtilizationWindow> {
        self.usage.as_ref().and_then(NormalizedUsage::as_window)
    }

    /// Applies a successful poll.
    pub fn apply_success(&mut self, usage: NormalizedUsage, now: DateTime<Utc>) {
        self.connected = true;
        self.error = None;
        self.error_kind = None;
        self.usage = Some(usage);
        self.last_updated = Some(now);
    }

    /// Applies a failed poll. The previous usage stays visible.
    pub fn apply_failure(&mut self, failure: UsageFailure) {
        self.connected = false;
        self.error = Some(failure.message);
        self.error_kind = Some(failure.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured() {
        let status = ProviderStatus::unconfigured(ProviderKind::Anthropic);
        assert!(status.is_unconfigured());
        assert!(!status.needs_reconnect());
        assert!(status.utilization_window().is_none());
    }

    #[test]
    fn test_failure_retains_usage() {
        let mut status = ProviderStatus::unconfigured(ProviderKind::Anthropic);
        status.apply_success(UtilizationWindow::new(30.0).into(), Utc::now());
        let before = status.usage.clone();

        status.apply_failure(UsageFailure::new(FailureKind::Auth, "token expired"));

        assert!(!status.connected);
        assert_eq!(status.error.as_deref(), Some("token expired"));
        assert!(status.needs_reconnect());
        assert_eq!(status.usage, before);
    }

    #[test]
    fn test_success_clears_error() {
        let mut status = ProviderStatus::unconfigured(ProviderKind::OpenAI);
        status.apply_failure(UsageFailure::new(FailureKind::Connection, "offline"));
        status.apply_success(UtilizationWindow::new(1.0).into(), Utc::now());
        assert!(status.connected);
        assert!(status.error.is_none());
        assert!(status.error_kind.is_none());
        assert!(status.last_updated.is_some());
    }

    #[test]
    fn test_normalization_failure_classification() {
        let err = CoreError::Normalization {
            provider: ProviderKind::OpenAI,
            expected: crate::models::UsageShape::TokenCostCounter,
            found: "utilization window".to_string(),
        };
        let failure = UsageFailure::from(err);
        assert_eq!(failure.kind, FailureKind::Normalization);
    }
}
