//! Alert rule evaluation.
//!
//! Evaluation is a pure function of the rules, the current statuses and the
//! notifications switch. `triggered` on every returned rule is recomputed
//! from scratch; nothing is carried over from the previous pass.

use manabar_core::{AlertRule, ProviderKind, ProviderStatus, UsageShape, UtilizationWindow};

/// Result of one evaluation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Rules with `triggered` recomputed, in input order.
    pub rules: Vec<AlertRule>,
    /// Number of rules that are enabled and triggered.
    pub triggered_count: usize,
}

/// Evaluates alert rules against provider statuses.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertEvaluator;

impl AlertEvaluator {
    /// Recomputes `triggered` for every rule.
    ///
    /// `statuses` must be in enabled-provider order: a rule without a
    /// `provider_id` watches the first window-shaped provider in it.
    ///
    /// A rule triggers when notifications are on, the rule is enabled, and
    /// its metric is at or above the threshold. A missing metric (counter
    /// provider, no data yet, no weekly quota) never triggers.
    pub fn evaluate(
        rules: &[AlertRule],
        statuses: &[ProviderStatus],
        notifications_enabled: bool,
    ) -> Evaluation {
        let rules: Vec<AlertRule> = rules
            .iter()
            .map(|rule| {
                let mut rule = rule.clone();
                rule.triggered =
                    notifications_enabled && rule.enabled && Self::fires(&rule, statuses);
                rule
            })
            .collect();

        let triggered_count = rules.iter().filter(|r| r.enabled && r.triggered).count();

        Evaluation {
            rules,
            triggered_count,
        }
    }

    /// Returns the rules in `current` that were not triggered in `previous`.
    ///
    /// Rules absent from `previous` count as previously untriggered.
    pub fn newly_triggered<'a>(
        previous: &[AlertRule],
        current: &'a [AlertRule],
    ) -> Vec<&'a AlertRule> {
        current
            .iter()
            .filter(|rule| rule.triggered)
            .filter(|rule| {
                !previous
                    .iter()
                    .any(|prev| prev.id == rule.id && prev.triggered)
            })
            .collect()
    }

    /// Returns the window a rule watches, if any.
    pub fn window_for<'a>(
        rule: &AlertRule,
        statuses: &'a [ProviderStatus],
    ) -> Option<&'a UtilizationWindow> {
        Self::target(rule, statuses)?.utilization_window()
    }

    /// Returns the status a rule watches.
    pub fn target<'a>(
        rule: &AlertRule,
        statuses: &'a [ProviderStatus],
    ) -> Option<&'a ProviderStatus> {
        match rule.provider_id {
            Some(provider) => statuses.iter().find(|s| s.provider_id == provider),
            None => statuses.iter().find(|s| is_window_provider(s.provider_id)),
        }
    }

    fn fires(rule: &AlertRule, statuses: &[ProviderStatus]) -> bool {
        Self::window_for(rule, statuses)
            .and_then(|window| window.metric(rule.metric))
            .is_some_and(|value| value >= rule.threshold_percent)
    }
}

fn is_window_provider(provider: ProviderKind) -> bool {
    provider.usage_shape() == UsageShape::UtilizationWindow
}

// ============================================================================
// Tests
// ============================================================================
