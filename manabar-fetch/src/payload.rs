//! Raw provider payloads.
//!
//! These mirror what providers report before normalization. Every field is
//! optional; the normalizer decides what a missing value means.

use serde::{Deserialize, Serialize};

/// A provider response, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawPayload {
    /// Percentage windows (Claude OAuth usage).
    Windows(RawWindowPayload),
    /// Token and cost totals (`OpenAI` organization usage).
    Counters(RawCounterPayload),
}

impl RawPayload {
    /// Short description used in normalization errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Windows(_) => "utilization window payload",
            Self::Counters(_) => "token/cost counter payload",
        }
    }
}

impl From<RawWindowPayload> for RawPayload {
    fn from(payload: RawWindowPayload) -> Self {
        Self::Windows(payload)
    }
}

impl From<RawCounterPayload> for RawPayload {
    fn from(payload: RawCounterPayload) -> Self {
        Self::Counters(payload)
    }
}

/// Response body of the Claude OAuth usage endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawWindowPayload {
    /// The 5-hour session window.
    #[serde(default)]
    pub five_hour: Option<RawWindow>,
    /// The 7-day window.
    #[serde(default)]
    pub seven_day: Option<RawWindow>,
}

/// One quota window as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawWindow {
    /// Percent used. May fall outside `[0, 100]`.
    #[serde(default)]
    pub utilization: Option<f64>,
    /// RFC 3339 reset time.
    #[serde(default)]
    pub resets_at: Option<String>,
}

impl RawWindow {
    /// Creates a window with the given utilization and no reset time.
    pub fn at(utilization: f64) -> Self {
        Self {
            utilization: Some(utilization),
            resets_at: None,
        }
    }
}

/// Aggregated organization usage over a trailing period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCounterPayload {
    /// Input tokens; negative values are reported by some backends on refunds.
    #[serde(default)]
    pub input_tokens: Option<i64>,
    /// Output tokens.
    #[serde(default)]
    pub output_tokens: Option<i64>,
    /// Request count.
    #[serde(default)]
    pub total_requests: Option<i64>,
    /// Cost in USD.
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    /// Accounting period in days.
    #[serde(default)]
    pub period_days: Option<u32>,
}
