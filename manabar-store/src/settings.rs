//! Engine settings.
//!
//! Persisted as a JSON object with four keys:
//!
//! ```json
//! {
//!   "enabledProviders": ["anthropic", "openai"],
//!   "pollingInterval": 60,
//!   "notificationsEnabled": true,
//!   "usageAlerts": [{"id": "...", "type": "period", "threshold": 80, "enabled": true}]
//! }
//! ```
//!
//! Each key is decoded on its own, so one malformed value never discards the
//! others.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use manabar_core::{AlertRule, CoreError, ProviderKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

// ============================================================================
// Poll Interval
// ============================================================================

/// Supported polling intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum PollInterval {
    /// Every 30 seconds.
    ThirtySeconds,
    /// Every minute.
    #[default]
    OneMinute,
    /// Every two minutes.
    TwoMinutes,
    /// Every five minutes.
    FiveMinutes,
}

impl PollInterval {
    /// All supported intervals, shortest first.
    pub fn all() -> &'static [PollInterval] {
        &[
            PollInterval::ThirtySeconds,
            PollInterval::OneMinute,
            PollInterval::TwoMinutes,
            PollInterval::FiveMinutes,
        ]
    }

    /// Interval length in seconds.
    pub fn as_secs(self) -> u64 {
        match self {
            Self::ThirtySeconds => 30,
            Self::OneMinute => 60,
            Self::TwoMinutes => 120,
            Self::FiveMinutes => 300,
        }
    }

    /// Interval as a duration.
    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.as_secs())
    }

    /// Looks up an interval by its length in seconds.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` for anything but 30, 60, 120 or 300.
    pub fn from_secs(secs: u64) -> Result<Self, CoreError> {
        Self::all()
            .iter()
            .copied()
            .find(|i| i.as_secs() == secs)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "unsupported polling interval {secs}s (allowed: 30, 60, 120, 300)"
                ))
            })
    }
}

impl TryFrom<u64> for PollInterval {
    type Error = CoreError;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        Self::from_secs(secs)
    }
}

impl From<PollInterval> for u64 {
    fn from(interval: PollInterval) -> Self {
        interval.as_secs()
    }
}

impl fmt::Display for PollInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThirtySeconds => write!(f, "30s"),
            Self::OneMinute => write!(f, "1m"),
            Self::TwoMinutes => write!(f, "2m"),
            Self::FiveMinutes => write!(f, "5m"),
        }
    }
}

impl FromStr for PollInterval {
    type Err = CoreError;

    /// Accepts plain seconds (`"30"`) or the display form (`"1m"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(secs) = s.parse::<u64>() {
            return Self::from_secs(secs);
        }
        Self::all()
            .iter()
            .copied()
            .find(|i| i.to_string() == s)
            .ok_or_else(|| CoreError::Validation(format!("unsupported polling interval: {s:?}")))
    }
}

// ============================================================================
// Engine Settings
// ============================================================================

/// Persisted engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    /// Enabled providers in display order, no duplicates.
    pub enabled_providers: Vec<ProviderKind>,
    /// How often to poll.
    #[serde(rename = "pollingInterval")]
    pub poll_interval: PollInterval,
    /// Master switch for alerts and desktop notifications.
    pub notifications_enabled: bool,
    /// Configured alert rules.
    pub usage_alerts: Vec<AlertRule>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            enabled_providers: vec![ProviderKind::Anthropic, ProviderKind::OpenAI],
            poll_interval: PollInterval::default(),
            notifications_enabled: true,
            usage_alerts: Vec::new(),
        }
    }
}

impl EngineSettings {
    /// Decodes settings leniently.
    ///
    /// Missing keys take their default. Malformed keys take their default
    /// and log a warning. Unknown provider ids and invalid alert rules are
    /// skipped individually.
    pub fn from_value(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(map) = value.as_object() else {
            warn!("Settings are not a JSON object, using defaults");
            return defaults;
        };

        let enabled_providers = match map.get("enabledProviders") {
            None => defaults.enabled_providers,
            Some(value) => decode_providers(value).unwrap_or_else(|| {
                warn!(key = "enabledProviders", "Malformed setting, using default");
                defaults.enabled_providers
            }),
        };

        let poll_interval = match map.get("pollingInterval") {
            None => defaults.poll_interval,
            Some(value) => value
                .as_u64()
                .and_then(|secs| PollInterval::from_secs(secs).ok())
                .unwrap_or_else(|| {
                    warn!(
                        key = "pollingInterval",
                        value = %value,
                        "Malformed setting, using default"
                    );
                    defaults.poll_interval
                }),
        };

        let notifications_enabled = match map.get("notificationsEnabled") {
            None => defaults.notifications_enabled,
            Some(value) => value.as_bool().unwrap_or_else(|| {
                warn!(
                    key = "notificationsEnabled",
                    value = %value,
                    "Malformed setting, using default"
                );
                defaults.notifications_enabled
            }),
        };

        let usage_alerts = match map.get("usageAlerts") {
            None => defaults.usage_alerts,
            Some(value) => decode_alerts(value).unwrap_or_else(|| {
                warn!(key = "usageAlerts", "Malformed setting, using default");
                defaults.usage_alerts
            }),
        };

        Self {
            enabled_providers,
            poll_interval,
            notifications_enabled,
            usage_alerts,
        }
    }

    /// Returns true if the provider is enabled.
    pub fn is_enabled(&self, provider: ProviderKind) -> bool {
        self.enabled_providers.contains(&provider)
    }

    /// Appends a provider. Returns false if it was already enabled.
    pub fn add_provider(&mut self, provider: ProviderKind) -> bool {
        if self.is_enabled(provider) {
            return false;
        }
        self.enabled_providers.push(provider);
        true
    }

    /// Removes a provider. Returns false if it was not enabled.
    pub fn remove_provider(&mut self, provider: ProviderKind) -> bool {
        let before = self.enabled_providers.len();
        self.enabled_providers.retain(|p| *p != provider);
        self.enabled_providers.len() != before
    }

    /// Inserts a rule or replaces the one with the same id.
    ///
    /// Returns true if the rule is new.
    pub fn upsert_alert(&mut self, rule: AlertRule) -> bool {
        if let Some(existing) = self.usage_alerts.iter_mut().find(|r| r.id == rule.id) {
            *existing = rule;
            false
        } else {
            self.usage_alerts.push(rule);
            true
        }
    }

    /// Deletes a rule by id. Returns false if no rule had that id.
    pub fn delete_alert(&mut self, id: &str) -> bool {
        let before = self.usage_alerts.len();
        self.usage_alerts.retain(|r| r.id != id);
        self.usage_alerts.len() != before
    }
}

fn decode_providers(value: &Value) -> Option<Vec<ProviderKind>> {
    let items = value.as_array()?;
    let mut providers = Vec::with_capacity(items.len());
    for item in items {
        let Some(id) = item.as_str() else {
            warn!(value = %item, "Skipping non-string provider id");
            continue;
        };
        match id.parse::<ProviderKind>() {
            Ok(kind) if !providers.contains(&kind) => providers.push(kind),
            Ok(kind) => debug!(provider = %kind, "Skipping duplicate provider"),
            Err(e) => warn!(error = %e, "Skipping unknown provider"),
        }
    }
    Some(providers)
}

fn decode_alerts(value: &Value) -> Option<Vec<AlertRule>> {
    let items = value.as_array()?;
    let mut rules: Vec<AlertRule> = Vec::with_capacity(items.len());
    for item in items {
        let mut rule = match serde_json::from_value::<AlertRule>(item.clone()) {
            Ok(rule) => rule,
            Err(e) => {
                warn!(error = %e, "Skipping malformed alert rule");
                continue;
            }
        };
        if rule.threshold_percent.is_finite() {
            rule.threshold_percent = rule.threshold_percent.clamp(0.0, 100.0);
        }
        if let Err(e) = rule.validate() {
            warn!(id = %rule.id, error = %e, "Skipping invalid alert rule");
            continue;
        }
        if rules.iter().any(|r| r.id == rule.id) {
            debug!(id = %rule.id, "Skipping duplicate alert rule");
            continue;
        }
        rules.push(rule);
    }
    Some(rules)
}

// ============================================================================
// Tests
// ============================================================================
