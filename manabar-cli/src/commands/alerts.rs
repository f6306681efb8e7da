//! Alerts command - manage usage alert rules.

use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};
use manabar_core::{AlertMetric, AlertRule};
use manabar_engine::Engine;

use super::{build_engine, parse_provider};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the alerts command.
#[derive(Args)]
pub struct AlertsArgs {
    #[command(subcommand)]
    pub action: Option<AlertsAction>,
}

/// Alerts subcommands.
#[derive(Subcommand)]
pub enum AlertsAction {
    /// List alert rules (default).
    List,

    /// Add a rule.
    Add {
        /// Watched window: `period` (5-hour) or `weekly`.
        metric: String,

        /// Threshold in percent (0-100).
        threshold: f64,

        /// Optional display label.
        #[arg(long)]
        label: Option<String>,

        /// Watch this provider instead of the first window provider.
        #[arg(long, short)]
        provider: Option<String>,
    },

    /// Delete a rule.
    Remove {
        /// Rule id.
        id: String,
    },

    /// Enable a rule.
    Enable {
        /// Rule id.
        id: String,
    },

    /// Disable a rule.
    Disable {
        /// Rule id.
        id: String,
    },
}

/// Runs the alerts command.
pub async fn run(args: &AlertsArgs, cli: &Cli) -> Result<()> {
    let engine = build_engine(cli, false).await;

    match &args.action {
        None | Some(AlertsAction::List) => list(&engine, cli).await,
        Some(AlertsAction::Add {
            metric,
            threshold,
            label,
            provider,
        }) => {
            let metric: AlertMetric = metric.parse()?;
            let mut rule = AlertRule::new(metric, *threshold)?;
            if let Some(label) = label {
                rule = rule.with_label(label.as_str());
            }
            if let Some(provider) = provider {
                rule = rule.for_provider(parse_provider(provider)?);
            }
            let id = rule.id.clone();
            let description = rule.display_label();
            engine.upsert_alert_rule(rule).await?;
            println!("Added alert {id}: {description}");
            Ok(())
        }
        Some(AlertsAction::Remove { id }) => {
            if !engine.delete_alert_rule(id).await {
                return Err(anyhow!("No alert rule with id {id}"));
            }
            println!("Removed alert {id}");
            Ok(())
        }
        Some(AlertsAction::Enable { id }) => set_enabled(&engine, id, true).await,
        Some(AlertsAction::Disable { id }) => set_enabled(&engine, id, false).await,
    }
}

async fn list(engine: &Engine, cli: &Cli) -> Result<()> {
    let rules = engine.alert_rules().await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!(
                "{}",
                formatter.format_alerts(
                    &rules,
                    engine.triggered_count(),
                    engine.notifications_enabled().await
                )
            );
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_alerts(&rules)?);
        }
    }

    Ok(())
}

async fn set_enabled(engine: &Engine, id: &str, enabled: bool) -> Result<()> {
    let mut rule = engine
        .alert_rules()
        .await
        .into_iter()
        .find(|r| r.id == id)
        .ok_or_else(|| anyhow!("No alert rule with id {id}"))?;

    rule.enabled = enabled;
    engine.upsert_alert_rule(rule).await?;
    println!("{} alert {id}", if enabled { "Enabled" } else { "Disabled" });
    Ok(())
}
