//! JSON output formatting.

use anyhow::Result;
use manabar_core::{AlertRule, ProviderKind, ProviderStatus};
use manabar_store::EngineSettings;
use serde::Serialize;

// ============================================================================
// Output Types
// ============================================================================

/// Full status report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub providers: Vec<ProviderStatus>,
    pub triggered_count: usize,
    pub alerts: Vec<AlertOutput>,
}

/// An alert rule including its derived `triggered` flag.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertOutput {
    #[serde(flatten)]
    pub rule: AlertRule,
    pub display_label: String,
    pub triggered: bool,
}

impl From<&AlertRule> for AlertOutput {
    fn from(rule: &AlertRule) -> Self {
        Self {
            rule: rule.clone(),
            display_label: rule.display_label(),
            triggered: rule.triggered,
        }
    }
}

/// Provider catalogue entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfoOutput {
    pub id: &'static str,
    pub display_name: &'static str,
    pub usage_shape: String,
    pub enabled: bool,
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats statuses and alert state.
    pub fn format_status(
        &self,
        statuses: Vec<ProviderStatus>,
        rules: &[AlertRule],
        triggered_count: usize,
    ) -> Result<String> {
        self.format(&StatusReport {
            providers: statuses,
            triggered_count,
            alerts: rules.iter().map(AlertOutput::from).collect(),
        })
    }

    /// Formats the alert rule list.
    pub fn format_alerts(&self, rules: &[AlertRule]) -> Result<String> {
        let alerts: Vec<AlertOutput> = rules.iter().map(AlertOutput::from).collect();
        self.format(&alerts)
    }

    /// Formats the provider catalogue.
    pub fn format_providers(&self, settings: &EngineSettings) -> Result<String> {
        let providers: Vec<ProviderInfoOutput> = ProviderKind::all()
            .iter()
            .map(|p| ProviderInfoOutput {
                id: p.id(),
                display_name: p.display_name(),
                usage_shape: p.usage_shape().to_string(),
                enabled: settings.is_enabled(*p),
            })
            .collect();
        self.format(&providers)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use manabar_core::{AlertMetric, UtilizationWindow};
    use serde_json::Value;

    #[test]
    fn test_format_pretty() {
        let formatter = JsonFormatter::new(true);
        let output = formatter.format(&serde_json::json!({"a": 1})).unwrap();
        assert!(output.contains('\n'));
    }

    #[test]
    fn test_format_compact() {
        let formatter = JsonFormatter::new(false);
        let output = formatter.format(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(output, r#"{"a":1}"#);
    }

    #[test]
    fn test_status_report_shape() {
        let mut status = ProviderStatus::unconfigured(ProviderKind::Anthropic);
        status.apply_success(UtilizationWindow::new(40.0).into(), Utc::now());
        let mut rule = AlertRule::new(AlertMetric::Period, 30.0).unwrap();
        rule.triggered = true;

        let output = JsonFormatter::new(false)
            .format_status(vec![status], &[rule], 1)
            .unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["triggeredCount"], 1);
        assert_eq!(value["providers"][0]["providerId"], "anthropic");
        assert_eq!(value["providers"][0]["connected"], true);
        assert_eq!(value["providers"][0]["usage"]["shape"], "utilization_window");
        assert_eq!(value["alerts"][0]["triggered"], true);
        assert_eq!(value["alerts"][0]["displayLabel"], "5-Hour at 30%");
    }

    #[test]
    fn test_providers_output() {
        let output = JsonFormatter::new(false)
            .format_providers(&EngineSettings::default())
            .unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        let providers = value.as_array().unwrap();

        assert_eq!(providers.len(), ProviderKind::all().len());
        assert_eq!(providers[0]["id"], "anthropic");
        assert_eq!(providers[0]["enabled"], true);
        assert_eq!(providers[2]["enabled"], false);
    }
}
