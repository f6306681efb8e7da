//! Raw payload normalization.
//!
//! Resolves the provider-specific [`RawPayload`] into the canonical
//! [`NormalizedUsage`] once, so nothing downstream inspects raw data.

use chrono::{DateTime, Utc};
use manabar_core::{
    CoreError, NormalizedUsage, ProviderKind, TokenCostCounter, UsageShape, UtilizationWindow,
    clamp_percent,
};
use manabar_fetch::{RawCounterPayload, RawPayload, RawWindow, RawWindowPayload};
use tracing::debug;

/// Accounting period assumed when a counter payload has none.
pub const DEFAULT_PERIOD_DAYS: u32 = 30;

/// Converts raw provider payloads into normalized usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageNormalizer;

impl UsageNormalizer {
    /// Normalizes a payload for a provider.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Normalization` if the payload shape differs from
    /// the provider's declared usage shape.
    pub fn normalize(
        provider: ProviderKind,
        raw: &RawPayload,
    ) -> Result<NormalizedUsage, CoreError> {
        match (provider.usage_shape(), raw) {
            (UsageShape::UtilizationWindow, RawPayload::Windows(payload)) => {
                Ok(normalize_windows(payload).into())
            }
            (UsageShape::TokenCostCounter, RawPayload::Counters(payload)) => {
                Ok(normalize_counters(payload).into())
            }
            (expected, other) => Err(CoreError::Normalization {
                provider,
                expected,
                found: other.kind_name().to_string(),
            }),
        }
    }
}

fn normalize_windows(payload: &RawWindowPayload) -> UtilizationWindow {
    let period = payload.five_hour.as_ref();
    let weekly = payload.seven_day.as_ref();

    UtilizationWindow {
        period_utilization: clamp_percent(period.and_then(|w| w.utilization).unwrap_or(0.0)),
        period_resets_at: period.and_then(parse_reset),
        weekly_utilization: weekly.and_then(|w| w.utilization).map(clamp_percent),
        weekly_resets_at: weekly.and_then(parse_reset),
    }
}

fn parse_reset(window: &RawWindow) -> Option<DateTime<Utc>> {
    let raw = window.resets_at.as_deref()?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            debug!(value = %raw, error = %e, "Ignoring unparseable reset time");
            None
        }
    }
}

fn normalize_counters(payload: &RawCounterPayload) -> TokenCostCounter {
    TokenCostCounter {
        input_tokens: non_negative(payload.input_tokens),
        output_tokens: non_negative(payload.output_tokens),
        total_requests: non_negative(payload.total_requests),
        total_cost_usd: payload
            .total_cost_usd
            .filter(|c| c.is_finite() && *c > 0.0)
            .unwrap_or(0.0),
        period_days: payload.period_days.unwrap_or(DEFAULT_PERIOD_DAYS),
    }
}

fn non_negative(value: Option<i64>) -> u64 {
    value.and_then(|v| u64::try_from(v).ok()).unwrap_or(0)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn windows(period: Option<f64>, weekly: Option<f64>) -> RawPayload {
        RawWindowPayload {
            five_hour: period.map(RawWindow::at),
            seven_day: weekly.map(RawWindow::at),
        }
        .into()
    }

    #[test]
    fn test_window_values_are_clamped() {
        for (raw, expected) in [
            (-20.0, 0.0),
            (0.0, 0.0),
            (55.5, 55.5),
            (100.0, 100.0),
            (180.0, 100.0),
            (f64::NAN, 0.0),
            (f64::NEG_INFINITY, 0.0),
        ] {
            let usage =
                UsageNormalizer::normalize(ProviderKind::Anthropic, &windows(Some(raw), Some(raw)))
                    .unwrap();
            let window = usage.as_window().unwrap();
            assert_eq!(window.period_utilization, expected, "raw {raw}");
            assert_eq!(window.weekly_utilization, Some(expected), "raw {raw}");
        }
    }

    #[test]
    fn test_missing_windows() {
        let usage =
            UsageNormalizer::normalize(ProviderKind::Anthropic, &windows(None, None)).unwrap();
        let window = usage.as_window().unwrap();
        assert_eq!(window.period_utilization, 0.0);
        assert_eq!(window.weekly_utilization, None);
    }

    #[test]
    fn test_reset_times() {
        let raw = RawPayload::Windows(RawWindowPayload {
            five_hour: Some(RawWindow {
                utilization: Some(10.0),
                resets_at: Some("2025-03-01T05:30:00+00:00".to_string()),
            }),
            seven_day: Some(RawWindow {
                utilization: Some(20.0),
                resets_at: Some("not a date".to_string()),
            }),
        });
        let usage = UsageNormalizer::normalize(ProviderKind::Anthropic, &raw).unwrap();
        let window = usage.as_window().unwrap();
        assert_eq!(window.period_resets_at.unwrap().timestamp(), 1_740_807_000);
        assert!(window.weekly_resets_at.is_none());
    }

    #[test]
    fn test_counter_defaults() {
        let raw = RawPayload::Counters(RawCounterPayload {
            input_tokens: Some(-5),
            output_tokens: Some(40),
            total_requests: None,
            total_cost_usd: Some(f64::NAN),
            period_days: None,
        });
        let usage = UsageNormalizer::normalize(ProviderKind::OpenAI, &raw).unwrap();
        let counter = usage.as_counter().unwrap();
        assert_eq!(counter.input_tokens, 0);
        assert_eq!(counter.output_tokens, 40);
        assert_eq!(counter.total_requests, 0);
        assert_eq!(counter.total_cost_usd, 0.0);
        assert_eq!(counter.period_days, 30);
        assert_eq!(counter.total_tokens(), 40);
    }

    #[test]
    fn test_negative_cost() {
        let raw = RawPayload::Counters(RawCounterPayload {
            total_cost_usd: Some(-1.5),
            ..Default::default()
        });
        let usage = UsageNormalizer::normalize(ProviderKind::Google, &raw).unwrap();
        assert_eq!(usage.as_counter().unwrap().total_cost_usd, 0.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let err = UsageNormalizer::normalize(ProviderKind::OpenAI, &windows(Some(10.0), None))
            .unwrap_err();
        assert!(err.is_normalization());

        let err = UsageNormalizer::normalize(
            ProviderKind::Anthropic,
            &RawPayload::Counters(RawCounterPayload::default()),
        )
        .unwrap_err();
        assert!(err.is_normalization());
    }
}
