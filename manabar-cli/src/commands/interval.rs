//! Interval command - show or set the polling interval.

use anyhow::Result;
use clap::Args;
use manabar_store::PollInterval;
use serde_json::json;
use tracing::info;

use super::build_engine;
use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the interval command.
#[derive(Args)]
pub struct IntervalArgs {
    /// New interval: 30, 60, 120 or 300 seconds (or 30s, 1m, 2m, 5m).
    pub interval: Option<String>,
}

/// Runs the interval command.
pub async fn run(args: &IntervalArgs, cli: &Cli) -> Result<()> {
    let engine = build_engine(cli, false).await;

    if let Some(raw) = &args.interval {
        let interval: PollInterval = raw.parse()?;
        engine.set_poll_interval(interval.as_secs()).await?;
        info!(interval = %interval, "Polling interval updated");
    }
    let interval = engine.poll_interval().await;

    match cli.format {
        OutputFormat::Text => println!("Polling interval: {interval}"),
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!(
                "{}",
                formatter.format(&json!({ "pollingInterval": interval.as_secs() }))?
            );
        }
    }

    Ok(())
}
