//! Credentials command - manage API keys in the system keychain.

use anyhow::Result;
use clap::{Args, Subcommand};
use manabar_core::AuthMethod;
use manabar_fetch::anthropic::credentials_file_path;
use serde_json::json;

use super::{build_engine, parse_provider};
use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the credentials command.
#[derive(Args)]
pub struct CredentialsArgs {
    #[command(subcommand)]
    pub action: Option<CredentialsAction>,
}

/// Credentials subcommands.
#[derive(Subcommand)]
pub enum CredentialsAction {
    /// Show which enabled providers have credentials (default).
    Status,

    /// Store an API key.
    Set {
        /// Provider id.
        provider: String,
        /// API key (an admin key for `OpenAI` organization usage).
        key: String,
    },

    /// Delete a stored API key.
    Remove {
        /// Provider id.
        provider: String,
    },
}

/// Runs the credentials command.
pub async fn run(args: &CredentialsArgs, cli: &Cli) -> Result<()> {
    let engine = build_engine(cli, false).await;

    match &args.action {
        None | Some(CredentialsAction::Status) => {
            let claude_path = credentials_file_path();
            let mut entries = Vec::new();
            for provider in engine.enabled_providers().await {
                let (stored, location) = match provider.auth_method() {
                    AuthMethod::OAuth => (
                        claude_path.as_ref().is_some_and(|p| p.exists()),
                        claude_path
                            .as_ref()
                            .map_or_else(|| "unknown".to_string(), |p| p.display().to_string()),
                    ),
                    AuthMethod::ApiKey => (
                        engine.has_credential(provider).await,
                        "keychain".to_string(),
                    ),
                };
                entries.push((provider, stored, location));
            }

            match cli.format {
                OutputFormat::Text => {
                    for (provider, stored, location) in &entries {
                        println!(
                            "{:<12} {:<8} {}",
                            provider.display_name(),
                            if *stored { "stored" } else { "missing" },
                            location
                        );
                    }
                }
                OutputFormat::Json => {
                    let formatter = JsonFormatter::new(cli.pretty);
                    let output: Vec<_> = entries
                        .iter()
                        .map(|(provider, stored, location)| {
                            json!({
                                "providerId": provider,
                                "stored": stored,
                                "location": location,
                            })
                        })
                        .collect();
                    println!("{}", formatter.format(&output)?);
                }
            }
            Ok(())
        }
        Some(CredentialsAction::Set { provider, key }) => {
            let provider = parse_provider(provider)?;
            if provider.auth_method() == AuthMethod::OAuth {
                anyhow::bail!(
                    "{} uses OAuth; sign in with the Claude CLI instead",
                    provider.display_name()
                );
            }
            let status = engine.save_credential(provider, key).await?;
            println!("Saved API key for {}", provider.display_name());
            match status {
                Some(status) if status.connected => println!("Connected"),
                Some(status) => println!(
                    "Not connected: {}",
                    status.error.as_deref().unwrap_or("unknown error")
                ),
                None => println!(
                    "{} is not enabled; add it with `manabar providers add {}`",
                    provider.display_name(),
                    provider
                ),
            }
            Ok(())
        }
        Some(CredentialsAction::Remove { provider }) => {
            let provider = parse_provider(provider)?;
            engine.remove_credential(provider).await?;
            println!("Removed API key for {}", provider.display_name());
            Ok(())
        }
    }
}
