//! Domain models for `ManaBar`.
//!
//! ## Submodules
//!
//! - [`provider`] - Provider types (`ProviderKind`, `Provider`, `UsageShape`)
//! - [`usage`] - Normalized usage shapes
//! - [`status`] - Per-provider status and failure classification
//! - [`alert`] - Alert rules

mod alert;
mod provider;
mod status;
mod usage;

// Re-export everything at the models level
pub use alert::{AlertMetric, AlertRule};
pub use provider::{AuthMethod, Provider, ProviderKind, UsageShape};
pub use status::{FailureKind, ProviderStatus, UsageFailure};
pub use usage::{NormalizedUsage, TokenCostCounter, UtilizationWindow, clamp_percent};
