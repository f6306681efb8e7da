// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `ManaBar` Core
//!
//! Core types and models for the `ManaBar` usage monitor.
//!
//! This crate provides the foundational abstractions used across all other
//! `ManaBar` crates:
//!
//! - Domain models (providers, normalized usage, provider status, alert rules)
//! - Error types
//!
//! ## Key Types
//!
//! ### Provider Types
//! - [`ProviderKind`] - Enum of all supported API providers
//! - [`Provider`] - Provider descriptor (id, display name, usage shape)
//! - [`UsageShape`] - Which canonical usage shape a provider family reports
//!
//! ### Usage Types
//! - [`NormalizedUsage`] - Tagged union of the two canonical usage shapes
//! - [`UtilizationWindow`] - Percentage-of-quota windows (period + weekly)
//! - [`TokenCostCounter`] - Token and cost counters over a period of days
//!
//! ### Status & Alerts
//! - [`ProviderStatus`] - Current connection and usage state of a provider
//! - [`UsageFailure`] - Classified failure recorded into a status
//! - [`AlertRule`] - User-configured utilization threshold

pub mod error;
pub mod models;

// Re-export error types
pub use error::CoreError;

// Re-export all model types
pub use models::{
    // Provider types
    AuthMethod,
    Provider,
    ProviderKind,
    UsageShape,
    // Usage types
    NormalizedUsage,
    TokenCostCounter,
    UtilizationWindow,
    clamp_percent,
    // Status
    FailureKind,
    ProviderStatus,
    UsageFailure,
    // Alerts
    AlertMetric,
    AlertRule,
};
