//! Text output formatting with progress bars and colors.

use chrono::{DateTime, Local, Utc};
use manabar_core::{
    AlertRule, NormalizedUsage, ProviderKind, ProviderStatus, TokenCostCounter, UtilizationWindow,
};
use manabar_engine::{period_countdown, weekly_countdown};
use manabar_store::EngineSettings;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Formats one provider's status.
    pub fn format_status(&self, status: &ProviderStatus, now: DateTime<Utc>) -> String {
        let provider = status.provider_id;
        let mut lines = vec![format!(
            "{} ({}) {}",
            self.bold(provider.display_name()),
            provider.id(),
            self.connection_badge(status)
        )];

        match &status.usage {
            Some(NormalizedUsage::UtilizationWindow(window)) => {
                lines.extend(self.format_window(window, now));
            }
            Some(NormalizedUsage::TokenCostCounter(counter)) => {
                lines.extend(self.format_counter(counter));
            }
            None if status.is_unconfigured() => lines.push(self.dim("  Not polled yet")),
            None => {}
        }

        if let Some(error) = &status.error {
            lines.push(format!("  {} {}", self.red("Error:"), error));
            if status.needs_reconnect() {
                lines.push(self.dim(&format!("  {}", reconnect_hint(provider))));
            }
        }

        if let Some(updated) = status.last_updated {
            let local = updated.with_timezone(&Local);
            lines.push(self.dim(&format!("  Updated {}", local.format("%H:%M:%S"))));
        }

        lines.join("\n")
    }

    fn connection_badge(&self, status: &ProviderStatus) -> String {
        if status.connected {
            self.green("● connected")
        } else if status.needs_reconnect() {
            self.yellow("● needs reconnect")
        } else if status.is_unconfigured() {
            self.dim("○ unconfigured")
        } else {
            self.red("● disconnected")
        }
    }

    fn format_window(&self, window: &UtilizationWindow, now: DateTime<Utc>) -> Vec<String> {
        let mut lines = vec![self.window_line("5-Hour", window.period_remaining())];
        if let Some(reset) = window
            .period_resets_at
            .and_then(|at| period_countdown(at, now))
        {
            lines.push(format!("           {}", self.dim(&reset)));
        }

        if let Some(remaining) = window.weekly_remaining() {
            lines.push(self.window_line("Weekly", remaining));
            if let Some(reset) = window
                .weekly_resets_at
                .and_then(|at| weekly_countdown(at, now))
            {
                lines.push(format!("           {}", self.dim(&reset)));
            }
        }
        lines
    }

    fn window_line(&self, label: &str, remaining: f64) -> String {
        let pct = self.color_for_percent(remaining, &format!("{remaining:.0}% left"));
        format!("  {:<8} {} {}", format!("{label}:"), self.progress_bar(remaining), pct)
    }

    #[allow(clippy::cast_precision_loss)]
    fn format_counter(&self, counter: &TokenCostCounter) -> Vec<String> {
        vec![
            format!(
                "  Tokens:   {} in / {} out ({} total)",
                format_number(counter.input_tokens as f64),
                format_number(counter.output_tokens as f64),
                format_number(counter.total_tokens() as f64)
            ),
            format!(
                "  Requests: {}",
                format_number(counter.total_requests as f64)
            ),
            format!(
                "  Cost:     {} over {} days",
                self.green(&format!("${:.2}", counter.total_cost_usd)),
                counter.period_days
            ),
        ]
    }

    /// Formats a progress bar of remaining capacity.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn progress_bar(&self, percent_remaining: f64) -> String {
        let filled = ((percent_remaining.clamp(0.0, 100.0) / 100.0) * self.bar_width as f64).round()
            as usize;
        let empty = self.bar_width.saturating_sub(filled);

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        self.color_for_percent(percent_remaining, &bar)
    }

    // ========================================================================
    // Alerts
    // ========================================================================

    /// Formats the alert rule list.
    pub fn format_alerts(
        &self,
        rules: &[AlertRule],
        triggered_count: usize,
        enabled: bool,
    ) -> String {
        let mut lines = vec![format!(
            "{} ({} triggered, notifications {})",
            self.bold("Usage Alerts"),
            triggered_count,
            if enabled { "on" } else { "off" }
        )];

        if rules.is_empty() {
            lines.push(self.dim("  No alert rules"));
        }

        for rule in rules {
            let marker = if rule.triggered {
                self.red("▲")
            } else if rule.enabled {
                self.green("●")
            } else {
                self.dim("○")
            };
            let scope = rule
                .provider_id
                .map_or_else(String::new, |p| format!(" [{}]", p.id()));
            lines.push(format!(
                "  {} {}{}  {}",
                marker,
                rule.display_label(),
                scope,
                self.dim(&rule.id)
            ));
        }

        lines.join("\n")
    }

    // ========================================================================
    // Providers & Settings
    // ========================================================================

    /// Formats the provider catalogue with enabled markers.
    pub fn format_providers(&self, settings: &EngineSettings) -> String {
        let mut lines = vec![format!(
            "{:<14} {:<12} {:<8} {}",
            "Provider", "Id", "Enabled", "Usage"
        )];
        lines.push("─".repeat(50));

        for provider in ProviderKind::all() {
            let enabled = if settings.is_enabled(*provider) {
                self.green("✓")
            } else {
                self.dim("−")
            };
            lines.push(format!(
                "{:<14} {:<12} {:<8} {}",
                provider.display_name(),
                provider.id(),
                enabled,
                provider.usage_shape()
            ));
        }

        lines.join("\n")
    }

    /// Formats the current settings.
    pub fn format_settings(&self, settings: &EngineSettings) -> String {
        let providers: Vec<&str> = settings
            .enabled_providers
            .iter()
            .map(ProviderKind::display_name)
            .collect();
        [
            format!("Providers:     {}", providers.join(", ")),
            format!("Interval:      {}", settings.poll_interval),
            format!(
                "Notifications: {}",
                if settings.notifications_enabled { "on" } else { "off" }
            ),
            format!("Alert rules:   {}", settings.usage_alerts.len()),
        ]
        .join("\n")
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_percent(&self, percent: f64, text: &str) -> String {
        if percent < 20.0 {
            self.red(text)
        } else if percent < 50.0 {
            self.yellow(text)
        } else {
            self.green(text)
        }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }
}

fn format_number(n: f64) -> String {
    if n >= 1_000_000.0 {
        format!("{:.1}M", n / 1_000_000.0)
    } else if n >= 1_000.0 {
        format!("{:.1}K", n / 1_000.0)
    } else {
        format!("{n:.0}")
    }
}

fn reconnect_hint(provider: ProviderKind) -> String {
    match provider {
        ProviderKind::Anthropic => {
            "Sign in with the Claude CLI to refresh ~/.claude/.credentials.json".to_string()
        }
        other => format!("Run `manabar credentials set {} <api-key>`", other.id()),
    }
}

// ============================================================================
// Tests
// ============================================================================
