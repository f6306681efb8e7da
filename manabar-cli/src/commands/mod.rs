//! CLI command implementations.

pub mod alerts;
pub mod credentials;
pub mod interval;
pub mod notifications;
pub mod providers;
pub mod status;
pub mod watch;

use std::sync::Arc;

use anyhow::Result;
use manabar_core::{CoreError, ProviderKind};
use manabar_engine::{Engine, EngineError};
use manabar_fetch::{CredentialStore, HttpUsageSource, SystemKeychain};
use manabar_store::JsonSettingsRepository;

use crate::Cli;
use crate::tray::DesktopTray;

/// Builds an engine wired to the settings file, the system keychain and the
/// provider HTTP clients.
///
/// Desktop notifications are only sent when `desktop` is set; one-shot
/// commands log alert crossings instead.
pub async fn build_engine(cli: &Cli, desktop: bool) -> Engine {
    let repository = match &cli.config {
        Some(path) => JsonSettingsRepository::new(path),
        None => JsonSettingsRepository::at_default_path(),
    };
    let credentials: Arc<dyn CredentialStore> = Arc::new(SystemKeychain::new());
    let source = HttpUsageSource::new(Arc::clone(&credentials));

    Engine::builder(Arc::new(source), Arc::new(DesktopTray::new(desktop)))
        .repository(Arc::new(repository))
        .credentials(credentials)
        .build()
        .await
}

/// Parses a provider id or alias (`claude`, `codex`).
pub fn parse_provider(id: &str) -> Result<ProviderKind> {
    Ok(id.parse::<ProviderKind>()?)
}

/// Returns true if the error came from invalid user input.
pub fn is_validation(err: &anyhow::Error) -> bool {
    if let Some(e) = err.downcast_ref::<EngineError>() {
        return e.is_validation();
    }
    err.downcast_ref::<CoreError>()
        .is_some_and(|e| matches!(e, CoreError::Validation(_)))
}
