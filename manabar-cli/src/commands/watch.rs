//! Watch command - keep polling and redraw after every round.

use std::io::{Write, stdout};

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::build_engine;
use super::status::render_text;
use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// Log alert crossings instead of sending desktop notifications.
    #[arg(long)]
    pub no_desktop: bool,
}

/// Runs the watch command until Ctrl+C.
pub async fn run(args: &WatchArgs, cli: &Cli) -> Result<()> {
    let engine = build_engine(cli, !args.no_desktop).await;
    if engine.enabled_providers().await.is_empty() {
        anyhow::bail!("No providers enabled. Run `manabar providers add <id>` first");
    }
    let interval = engine.poll_interval().await;
    info!(interval = %interval, "Starting watch mode");

    let mut rounds = engine.subscribe_rounds();
    engine.start().await;

    loop {
        tokio::select! {
            changed = rounds.changed() => {
                if changed.is_err() {
                    break;
                }
                let statuses = engine.statuses().await;
                match cli.format {
                    OutputFormat::Text => {
                        print!("\x1b[2J\x1b[H");
                        stdout().flush()?;

                        let now = chrono::Local::now();
                        println!(
                            "ManaBar Watch Mode - {} (every {})",
                            now.format("%H:%M:%S"),
                            interval
                        );
                        println!("{}", "─".repeat(50));
                        println!();
                        println!("{}", render_text(&engine, &statuses, !cli.no_color).await);
                        println!();
                        println!("Press Ctrl+C to exit");
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
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    engine.shutdown().await;
    Ok(())
}
