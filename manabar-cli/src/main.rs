// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `ManaBar` CLI - API usage quota monitoring from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Poll every enabled provider once and show status
//! manabar
//!
//! # JSON output
//! manabar --format json --pretty
//!
//! # Keep polling and send desktop alerts
//! manabar watch
//!
//! # Alert when the 5-hour window reaches 80%
//! manabar alerts add period 80
//!
//! # Poll every 30 seconds
//! manabar interval 30
//! ```

mod commands;
mod output;
mod tray;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{alerts, credentials, interval, notifications, providers, status, watch};

// ============================================================================
// CLI Definition
// ============================================================================

/// `ManaBar` CLI - API usage quota monitoring.
#[derive(Parser)]
#[command(name = "manabar")]
#[command(about = "API usage quota monitoring and alerts")]
#[command(long_about = r"
ManaBar polls API providers for quota usage and alerts when thresholds
are crossed.

Supported providers:
  • Claude (anthropic)   5-hour and weekly utilization windows
  • Codex (openai)       token and cost counters

Examples:
  manabar                        # Poll once and show status
  manabar watch                  # Keep polling, send desktop alerts
  manabar providers add openai   # Enable a provider
  manabar alerts add weekly 90   # Alert at 90% weekly utilization
  manabar credentials set openai sk-admin-...
")]
#[command(version)]
#[command(author = "ManaBar Contributors")]
pub struct Cli {
    /// Subcommand to run. If none, runs 'status' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Settings file to use instead of the default (or `$MANABAR_CONFIG`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Poll every enabled provider once and show status (default).
    #[command(visible_alias = "s")]
    Status,

    /// Poll every enabled provider once and report what changed.
    #[command(visible_alias = "r")]
    Refresh,

    /// Keep polling on the configured interval.
    #[command(visible_alias = "w")]
    Watch(watch::WatchArgs),

    /// List, enable or disable providers.
    #[command(visible_alias = "p")]
    Providers(providers::ProvidersArgs),

    /// Manage usage alert rules.
    #[command(visible_alias = "a")]
    Alerts(alerts::AlertsArgs),

    /// Show or toggle usage notifications.
    Notifications(notifications::NotificationsArgs),

    /// Show or set the polling interval.
    Interval(interval::IntervalArgs),

    /// Manage stored API keys.
    Credentials(credentials::CredentialsArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Invalid input (unknown provider, bad threshold or interval).
    Validation = 2,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("manabar=debug,info")
    } else {
        EnvFilter::new("manabar=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Some(Commands::Status) | None => status::run(&cli).await,
        Some(Commands::Refresh) => status::run_refresh(&cli).await,
        Some(Commands::Watch(args)) => watch::run(args, &cli).await,
        Some(Commands::Providers(args)) => providers::run(args, &cli).await,
        Some(Commands::Alerts(args)) => alerts::run(args, &cli).await,
        Some(Commands::Notifications(args)) => notifications::run(args, &cli).await,
        Some(Commands::Interval(args)) => interval::run(args, &cli).await,
        Some(Commands::Credentials(args)) => credentials::run(args, &cli).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e}");
        }
        let code = if commands::is_validation(&e) {
            ExitCode::Validation
        } else {
            ExitCode::Error
        };
        std::process::exit(code as i32);
    }

    Ok(())
}
