//! Notification dispatch.
//!
//! Pushes remaining-capacity figures to the tray and sends one desktop
//! notification per alert crossing. Collaborator failures are logged and
//! dropped; they never reach the poll loop.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use manabar_core::{AlertMetric, AlertRule, ProviderStatus, UtilizationWindow};
use tracing::{debug, info, warn};

use crate::error::NotifyError;

// ============================================================================
// Tray Notifier Trait
// ============================================================================

/// Host tray / notification center.
#[async_trait]
pub trait TrayNotifier: Send + Sync {
    /// Redraws the tray icon and menu.
    async fn update_tray(&self, summary: &TraySummary) -> Result<(), NotifyError>;

    /// Shows a desktop notification.
    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

// ============================================================================
// Summary Types
// ============================================================================

/// Remaining capacity (`100 - utilization`) of the watched windows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Remaining {
    /// Remaining period capacity in percent.
    pub period_remaining: f64,
    /// Remaining weekly capacity in percent; 100 when there is no weekly quota.
    pub weekly_remaining: f64,
}

impl Remaining {
    /// Nothing used.
    pub const FULL: Remaining = Remaining {
        period_remaining: 100.0,
        weekly_remaining: 100.0,
    };

    /// Computes remaining capacity from a window.
    pub fn from_window(window: Option<&UtilizationWindow>) -> Self {
        match window {
            Some(window) => Self {
                period_remaining: window.period_remaining(),
                weekly_remaining: window.weekly_remaining().unwrap_or(100.0),
            },
            None => Self::FULL,
        }
    }
}

/// One rule that just crossed its threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCrossing {
    /// Display label of the rule.
    pub label: String,
    /// Watched metric.
    pub metric: AlertMetric,
    /// Utilization that caused the crossing.
    pub utilization: f64,
    /// Rule threshold.
    pub threshold: f64,
}

impl AlertCrossing {
    /// Builds a crossing from a triggered rule and its watched window.
    pub fn new(rule: &AlertRule, window: Option<&UtilizationWindow>) -> Self {
        Self {
            label: rule.display_label(),
            metric: rule.metric,
            utilization: window.and_then(|w| w.metric(rule.metric)).unwrap_or(0.0),
            threshold: rule.threshold_percent,
        }
    }

    /// Notification title.
    pub fn title(&self) -> String {
        format!("Usage Alert: {} Limit", self.metric.label())
    }

    /// Notification body.
    pub fn body(&self) -> String {
        format!(
            "{}: {} utilization at {:.0}% (threshold: {:.0}%)",
            self.label,
            self.metric.label(),
            self.utilization,
            self.threshold
        )
    }
}

/// Aggregate alert state passed along with each dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggeredSummary {
    /// Number of enabled, triggered rules.
    pub count: usize,
    /// Rules that crossed since the previous evaluation.
    pub newly_triggered: Vec<AlertCrossing>,
}

/// Text shown in the tray menu.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuDetails {
    /// Menu header.
    pub title: String,
    /// Whether the watched provider is connected.
    pub connected: bool,
    /// e.g. `5-Hour: 18% remaining`.
    pub period_line: String,
    /// e.g. `Weekly: 55% remaining`.
    pub weekly_line: String,
    /// e.g. `Resets in 1h 5m`.
    pub period_reset: Option<String>,
    /// e.g. `Resets in 2d 3h`.
    pub weekly_reset: Option<String>,
}

impl MenuDetails {
    /// Builds menu text for the watched provider's status.
    pub fn from_status(status: Option<&ProviderStatus>, now: DateTime<Utc>) -> Self {
        let window = status.and_then(ProviderStatus::utilization_window);
        let remaining = Remaining::from_window(window);
        let title = status.map_or_else(
            || "Usage".to_string(),
            |s| format!("{} Usage", s.provider_id.display_name()),
        );

        Self {
            title,
            connected: status.is_some_and(|s| s.connected),
            period_line: format!("5-Hour: {:.0}% remaining", remaining.period_remaining),
            weekly_line: format!("Weekly: {:.0}% remaining", remaining.weekly_remaining),
            period_reset: window
                .and_then(|w| w.period_resets_at)
                .and_then(|at| period_countdown(at, now)),
            weekly_reset: window
                .and_then(|w| w.weekly_resets_at)
                .and_then(|at| weekly_countdown(at, now)),
        }
    }
}

/// Everything the tray needs for one redraw.
#[derive(Debug, Clone, PartialEq)]
pub struct TraySummary {
    /// Remaining capacity.
    pub remaining: Remaining,
    /// Number of triggered alerts (badge).
    pub triggered_count: usize,
    /// Menu text.
    pub menu: MenuDetails,
}

/// Countdown to a period reset: `Resets in 1h 5m` or `Resets in 12m`.
///
/// Returns `None` once the reset time has passed.
pub fn period_countdown(resets_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<String> {
    let diff = resets_at.signed_duration_since(now);
    if diff.num_seconds() <= 0 {
        return None;
    }
    let hours = diff.num_hours();
    let mins = diff.num_minutes() % 60;
    Some(if hours > 0 {
        format!("Resets in {hours}h {mins}m")
    } else {
        format!("Resets in {mins}m")
    })
}

/// Countdown to a weekly reset: `Resets in 2d 3h` or `Resets in 5h`.
///
/// Returns `None` once the reset time has passed.
pub fn weekly_countdown(resets_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<String> {
    let diff = resets_at.signed_duration_since(now);
    if diff.num_seconds() <= 0 {
        return None;
    }
    let days = diff.num_days();
    let hours = diff.num_hours() % 24;
    Some(if days > 0 {
        format!("Resets in {days}d {hours}h")
    } else {
        format!("Resets in {hours}h")
    })
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Forwards summaries to a [`TrayNotifier`], swallowing its failures.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tray: Arc<dyn TrayNotifier>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher for a tray.
    pub fn new(tray: Arc<dyn TrayNotifier>) -> Self {
        Self { tray }
    }

    /// Updates the tray and sends one notification per new crossing.
    ///
    /// Never fails; collaborator errors are logged at `warn`.
    pub async fn dispatch(
        &self,
        remaining: Remaining,
        menu: MenuDetails,
        triggered: &TriggeredSummary,
    ) {
        let summary = TraySummary {
            remaining,
            triggered_count: triggered.count,
            menu,
        };

        debug!(
            period_remaining = remaining.period_remaining,
            weekly_remaining = remaining.weekly_remaining,
            triggered = triggered.count,
            "Updating tray"
        );
        if let Err(e) = self.tray.update_tray(&summary).await {
            warn!(error = %e, "Tray update failed");
        }

        for crossing in &triggered.newly_triggered {
            info!(
                label = %crossing.label,
                metric = %crossing.metric,
                utilization = crossing.utilization,
                threshold = crossing.threshold,
                "Sending usage alert"
            );
            if let Err(e) = self.tray.notify(&crossing.title(), &crossing.body()).await {
                warn!(label = %crossing.label, error = %e, "Desktop notification failed");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
