//! Integration tests for core model types.

use chrono::Utc;
use manabar_core::{
    NormalizedUsage, ProviderKind, ProviderStatus, TokenCostCounter, UsageShape, UtilizationWindow,
};

#[test]
fn test_status_serialization_roundtrip() {
    let mut status = ProviderStatus::unconfigured(ProviderKind::Anthropic);
    status.apply_success(UtilizationWindow::new(55.0).with_weekly(20.0).into(), Utc::now());

    let json = serde_json::to_string(&status).unwrap();
    let parsed: ProviderStatus = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, status);
    assert_eq!(parsed.utilization_window().unwrap().weekly_utilization, Some(20.0));
}

#[test]
fn test_counter_usage_has_no_window() {
    let usage = NormalizedUsage::from(TokenCostCounter {
        input_tokens: 10,
        output_tokens: 5,
        total_requests: 1,
        total_cost_usd: 0.01,
        period_days: 30,
    });
    assert_eq!(usage.shape(), UsageShape::TokenCostCounter);
    assert!(usage.as_window().is_none());
    assert_eq!(usage.as_counter().unwrap().total_tokens(), 15);
}
