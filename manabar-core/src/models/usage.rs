//! Normalized usage types.
//!
//! Every provider's raw payload is reduced to exactly one of two shapes:
//! - [`UtilizationWindow`] - percentage-of-quota windows
//! - [`TokenCostCounter`] - token and cost counters
//!
//! [`NormalizedUsage`] is the tagged union of the two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::alert::AlertMetric;
use super::provider::UsageShape;

/// Clamps a utilization percentage into `[0, 100]`.
///
/// NaN and infinities are treated as `0.0`.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

// ============================================================================
// Normalized Usage
// ============================================================================

/// Canonical usage snapshot for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum NormalizedUsage {
    /// Percentage windows.
    UtilizationWindow(UtilizationWindow),
    /// Token/cost counters.
    TokenCostCounter(TokenCostCounter),
}

impl NormalizedUsage {
    /// Returns the shape of this usage value.
    pub fn shape(&self) -> UsageShape {
        match self {
            Self::UtilizationWindow(_) => UsageShape::UtilizationWindow,
            Self::TokenCostCounter(_) => UsageShape::TokenCostCounter,
        }
    }

    /// Returns the utilization window, if this is one.
    pub fn as_window(&self) -> Option<&UtilizationWindow> {
        match self {
            Self::UtilizationWindow(w) => Some(w),
            Self::TokenCostCounter(_) => None,
        }
    }

    /// Returns the counters, if this is one.
    pub fn as_counter(&self) -> Option<&TokenCostCounter> {
        match self {
            Self::TokenCostCounter(c) => Some(c),
            Self::UtilizationWindow(_) => None,
        }
    }
}

impl From<UtilizationWindow> for NormalizedUsage {
    fn from(window: UtilizationWindow) -> Self {
        Self::UtilizationWindow(window)
    }
}

impl From<TokenCostCounter> for NormalizedUsage {
    fn from(counter: TokenCostCounter) -> Self {
        Self::TokenCostCounter(counter)
    }
}

// ============================================================================
// Utilization Window
// ============================================================================

/// Period and weekly utilization for quota-window providers.
///
/// A `None` weekly figure means the provider has no weekly quota, which is
/// different from 0% used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationWindow {
    /// Percentage of the period (5-hour) quota used, in `[0, 100]`.
    pub period_utilization: f64,
    /// When the period window resets.
    pub period_resets_at: Option<DateTime<Utc>>,
    /// Percentage of the weekly quota used, in `[0, 100]`.
    pub weekly_utilization: Option<f64>,
    /// When the weekly window resets.
    pub weekly_resets_at: Option<DateTime<Utc>>,
}

impl UtilizationWindow {
    /// Creates a window with the given period utilization (clamped).
    pub fn new(period_utilization: f64) -> Self {
        Self {
            period_utilization: clamp_percent(period_utilization),
            period_resets_at: None,
            weekly_utilization: None,
            weekly_resets_at: None,
        }
    }

    /// Sets the weekly utilization (clamped).
    #[must_use]
    pub fn with_weekly(mut self, weekly_utilization: f64) -> Self {
        self.weekly_utilization = Some(clamp_percent(weekly_utilization));
        self
    }

    /// Reads the value of an alert metric from this window.
    pub fn metric(&self, metric: AlertMetric) -> Option<f64> {
        match metric {
            AlertMetric::Period => Some(self.period_utilization),
            AlertMetric::Weekly => self.weekly_utilization,
        }
    }

    /// Remaining period capacity (`100 - utilization`).
    pub fn period_remaining(&self) -> f64 {
        100.0 - self.period_utilization
    }

    /// Remaining weekly capacity, if the provider has a weekly quota.
    pub fn weekly_remaining(&self) -> Option<f64> {
        self.weekly_utilization.map(|u| 100.0 - u)
    }
}

impl Default for UtilizationWindow {
    fn default() -> Self {
        Self::new(0.0)
    }
}

// ============================================================================
// Token/Cost Counter
// ============================================================================

/// Token and cost totals over a trailing period.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCostCounter {
    /// Input (prompt) tokens.
    pub input_tokens: u64,
    /// Output (completion) tokens.
    pub output_tokens: u64,
    /// Number of requests.
    pub total_requests: u64,
    /// Total cost in USD, never negative.
    pub total_cost_usd: f64,
    /// Length of the accounting period in days.
    pub period_days: u32,
}

impl TokenCostCounter {
    /// Sum of input and output tokens.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

// ============================================================================
// Tests
// ============================================================================
