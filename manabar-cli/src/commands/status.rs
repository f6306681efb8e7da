//! Status and refresh commands - poll once and report.

use anyhow::Result;
use chrono::Utc;
use manabar_core::ProviderStatus;
use manabar_engine::Engine;
use serde_json::json;
use tracing::info;

use super::build_engine;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Polls every enabled provider once and prints full status.
pub async fn run(cli: &Cli) -> Result<()> {
    let engine = build_engine(cli, false).await;
    let statuses = poll_once(&engine).await;

    match cli.format {
        OutputFormat::Text => {
            println!("{}", render_text(&engine, &statuses, !cli.no_color).await);
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            let rules = engine.alert_rules().await;
            println!(
                "{}",
                formatter.format_status(statuses, &rules, engine.triggered_count())?
            );
        }
    }

    Ok(())
}

/// Polls every enabled provider once and prints a one-line result each.
pub async fn run_refresh(cli: &Cli) -> Result<()> {
    let engine = build_engine(cli, false).await;
    let statuses = poll_once(&engine).await;
    let connected = statuses.iter().filter(|s| s.connected).count();

    match cli.format {
        OutputFormat::Text => {
            for status in &statuses {
                let outcome = match &status.error {
                    Some(error) => format!("failed: {error}"),
                    None => "ok".to_string(),
                };
                println!("{:<12} {}", status.provider_id.display_name(), outcome);
            }
            if !cli.quiet {
                println!(
                    "Refreshed {} provider(s), {} connected, {} alert(s) triggered",
                    statuses.len(),
                    connected,
                    engine.triggered_count()
                );
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            let results: Vec<_> = statuses
                .iter()
                .map(|s| {
                    json!({
                        "providerId": s.provider_id,
                        "connected": s.connected,
                        "error": s.error,
                    })
                })
                .collect();
            println!(
                "{}",
                formatter.format(&json!({
                    "refreshed": statuses.len(),
                    "connected": connected,
                    "triggeredCount": engine.triggered_count(),
                    "results": results,
                }))?
            );
        }
    }

    Ok(())
}

async fn poll_once(engine: &Engine) -> Vec<ProviderStatus> {
    let providers = engine.enabled_providers().await;
    info!(providers = providers.len(), "Polling providers");
    engine.refresh_now().await;
    engine.statuses().await
}

/// Renders statuses and alert state as text.
pub async fn render_text(engine: &Engine, statuses: &[ProviderStatus], use_colors: bool) -> String {
    let formatter = TextFormatter::new(use_colors);
    let now = Utc::now();

    if statuses.is_empty() {
        return "No providers enabled. Run `manabar providers add <id>`.".to_string();
    }

    let mut sections: Vec<String> = statuses
        .iter()
        .map(|status| formatter.format_status(status, now))
        .collect();

    let rules = engine.alert_rules().await;
    if !rules.is_empty() {
        sections.push(formatter.format_alerts(
            &rules,
            engine.triggered_count(),
            engine.notifications_enabled().await,
        ));
    }

    sections.join("\n\n")
}
