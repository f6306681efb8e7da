//! Alert rule types.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use super::provider::ProviderKind;
use crate::error::CoreError;

static NEXT_RULE_SEQ: AtomicU32 = AtomicU32::new(0);

/// Utilization metric an alert rule watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertMetric {
    /// The short (5-hour) period window.
    Period,
    /// The weekly window.
    Weekly,
}

impl AlertMetric {
    /// Human-readable name of the window.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Period => "5-Hour",
            Self::Weekly => "Weekly",
        }
    }
}

impl fmt::Display for AlertMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Period => write!(f, "period"),
            Self::Weekly => write!(f, "weekly"),
        }
    }
}

impl FromStr for AlertMetric {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "period" | "5h" | "session" => Ok(Self::Period),
            "weekly" | "week" | "7d" => Ok(Self::Weekly),
            other => Err(CoreError::Validation(format!("unknown alert metric: {other:?}"))),
        }
    }
}

/// A user-configured threshold on a utilization metric.
///
/// `triggered` is a view of current state written only by the alert
/// evaluator; it is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    /// Unique rule id.
    pub id: String,
    /// Which window this rule watches.
    #[serde(rename = "type", alias = "metric")]
    pub metric: AlertMetric,
    /// Threshold in percent, inclusive, in `[0, 100]`.
    #[serde(rename = "threshold", alias = "thresholdPercent")]
    pub threshold_percent: f64,
    /// Whether the rule is active.
    pub enabled: bool,
    /// Optional user label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Provider to watch. Defaults to the first window-shaped enabled provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<ProviderKind>,
    /// Derived: whether the rule currently fires.
    #[serde(skip)]
    pub triggered: bool,
}

impl AlertRule {
    /// Creates an enabled rule with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if the threshold is outside `[0, 100]`.
    pub fn new(metric: AlertMetric, threshold_percent: f64) -> Result<Self, CoreError> {
        let rule = Self {
            id: generate_rule_id(),
            metric,
            threshold_percent,
            enabled: true,
            label: None,
            provider_id: None,
            triggered: false,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Sets the label; blank labels are dropped.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        let trimmed = label.trim();
        self.label = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Pins the rule to a provider.
    #[must_use]
    pub fn for_provider(mut self, provider: ProviderKind) -> Self {
        self.provider_id = Some(provider);
        self
    }

    /// Checks the rule's invariants.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` for an empty id or a threshold
    /// outside `[0, 100]`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.trim().is_empty() {
            return Err(CoreError::Validation("alert rule id must not be empty".to_string()));
        }
        if !self.threshold_percent.is_finite() || !(0.0..=100.0).contains(&self.threshold_percent) {
            return Err(CoreError::Validation(format!(
                "threshold {} out of valid range [0, 100]",
                self.threshold_percent
            )));
        }
        Ok(())
    }

    /// Label for display: the user label or a generated description.
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("{} at {:.0}%", self.metric.label(), self.threshold_percent),
        }
    }
}

fn generate_rule_id() -> String {
    let seq = NEXT_RULE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{:x}{:03x}", Utc::now().timestamp_millis(), seq & 0xfff)
}
