//! Providers command - list, enable and disable providers.

use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::info;

use super::{build_engine, parse_provider};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the providers command.
#[derive(Args)]
pub struct ProvidersArgs {
    #[command(subcommand)]
    pub action: Option<ProvidersAction>,
}

/// Providers subcommands.
#[derive(Subcommand)]
pub enum ProvidersAction {
    /// List known providers (default).
    List,

    /// Enable a provider.
    Add {
        /// Provider id (`anthropic`, `openai`, ...).
        provider: String,
    },

    /// Disable a provider and delete its stored API key.
    Remove {
        /// Provider id.
        provider: String,
    },
}

/// Runs the providers command.
pub async fn run(args: &ProvidersArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        None | Some(ProvidersAction::List) => list(cli).await,
        Some(ProvidersAction::Add { provider }) => add(provider, cli).await,
        Some(ProvidersAction::Remove { provider }) => remove(provider, cli).await,
    }
}

async fn list(cli: &Cli) -> Result<()> {
    let engine = build_engine(cli, false).await;
    let settings = engine.settings().await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_providers(&settings));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_providers(&settings)?);
        }
    }

    Ok(())
}

async fn add(id: &str, cli: &Cli) -> Result<()> {
    let provider = parse_provider(id)?;
    let engine = build_engine(cli, false).await;

    if engine.add_provider(provider).await {
        info!(provider = %provider, "Provider enabled");
        println!("Enabled: {}", provider.display_name());
    } else {
        println!("Already enabled: {}", provider.display_name());
    }

    Ok(())
}

async fn remove(id: &str, cli: &Cli) -> Result<()> {
    let provider = parse_provider(id)?;
    let engine = build_engine(cli, false).await;

    if engine.remove_provider(provider).await {
        info!(provider = %provider, "Provider disabled");
        println!("Disabled: {}", provider.display_name());
    } else {
        println!("Not enabled: {}", provider.display_name());
    }

    Ok(())
}
