//! Notifications command - show or toggle usage notifications.

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde_json::json;

use super::build_engine;
use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Notification switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    /// Evaluate alerts and notify.
    On,
    /// Clear triggered alerts and stay silent.
    Off,
}

/// Arguments for the notifications command.
#[derive(Args)]
pub struct NotificationsArgs {
    /// New state. Omit to show the current one.
    pub state: Option<Toggle>,
}

/// Runs the notifications command.
pub async fn run(args: &NotificationsArgs, cli: &Cli) -> Result<()> {
    let engine = build_engine(cli, false).await;

    if let Some(state) = args.state {
        engine.set_notifications_enabled(state == Toggle::On).await;
    }
    let enabled = engine.notifications_enabled().await;

    match cli.format {
        OutputFormat::Text => {
            println!("Notifications: {}", if enabled { "on" } else { "off" });
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&json!({ "notificationsEnabled": enabled }))?);
        }
    }

    Ok(())
}
