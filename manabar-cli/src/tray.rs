//! Terminal stand-in for the menu bar tray.
//!
//! Tray redraws are logged; alert crossings become desktop notifications
//! (macOS `osascript`) when enabled, and log lines otherwise.

use async_trait::async_trait;
use manabar_engine::{NotifyError, TrayNotifier, TraySummary};
use tracing::{debug, info};

/// [`TrayNotifier`] for the CLI.
pub struct DesktopTray {
    desktop_notifications: bool,
}

impl DesktopTray {
    /// Creates a tray. With `desktop_notifications` off, alerts are only
    /// logged.
    pub fn new(desktop_notifications: bool) -> Self {
        Self {
            desktop_notifications,
        }
    }
}

#[async_trait]
impl TrayNotifier for DesktopTray {
    async fn update_tray(&self, summary: &TraySummary) -> Result<(), NotifyError> {
        debug!(
            title = %summary.menu.title,
            period = %summary.menu.period_line,
            weekly = %summary.menu.weekly_line,
            triggered = summary.triggered_count,
            "Tray updated"
        );
        Ok(())
    }

    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        if !self.desktop_notifications {
            info!(title, body, "Usage alert");
            return Ok(());
        }
        send_desktop_notification(title, body).await
    }
}

#[cfg(target_os = "macos")]
async fn send_desktop_notification(title: &str, body: &str) -> Result<(), NotifyError> {
    let script = format!(
        "display notification \"{}\" with title \"{}\"",
        applescript_escape(body),
        applescript_escape(title)
    );

    let status = tokio::process::Command::new("osascript")
        .args(["-e", &script])
        .status()
        .await
        .map_err(|e| NotifyError::Unavailable(e.to_string()))?;

    if status.success() {
        debug!(title, "Notification sent");
        Ok(())
    } else {
        Err(NotifyError::Failed(format!("osascript exited with {status}")))
    }
}

#[cfg(not(target_os = "macos"))]
async fn send_desktop_notification(title: &str, body: &str) -> Result<(), NotifyError> {
    info!(title, body, "Usage alert");
    Err(NotifyError::Unavailable(
        "desktop notifications are only supported on macOS".to_string(),
    ))
}

/// Escapes a string for use inside an `AppleScript` string literal.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn applescript_escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applescript_escape() {
        assert_eq!(applescript_escape(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(applescript_escape("a\\b"), "a\\\\b");
        assert_eq!(applescript_escape("line\nbreak"), "line break");
    }

    #[tokio::test]
    async fn test_logging_tray_never_fails() {
        let tray = DesktopTray::new(false);
        tray.notify("Usage Alert: 5-Hour Limit", "body").await.unwrap();
    }
}
