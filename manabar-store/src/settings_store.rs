//! Settings repositories.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::persistence::{default_settings_path, save_json};
use crate::settings::EngineSettings;

// ============================================================================
// Repository Trait
// ============================================================================

/// Typed access to the persisted settings.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Loads settings. A missing store yields the defaults.
    async fn load(&self) -> Result<EngineSettings, StoreError>;

    /// Persists settings.
    async fn save(&self, settings: &EngineSettings) -> Result<(), StoreError>;
}

// ============================================================================
// JSON File Repository
// ============================================================================

/// Settings stored in a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonSettingsRepository {
    path: PathBuf,
}

impl JsonSettingsRepository {
    /// Creates a repository backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a repository at the default settings path.
    pub fn at_default_path() -> Self {
        Self::new(default_settings_path())
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsRepository for JsonSettingsRepository {
    async fn load(&self) -> Result<EngineSettings, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await.map_err(StoreError::from) {
            Ok(content) => content,
            Err(e) if e.is_not_found() => {
                debug!(path = %self.path.display(), "Settings file not found, using defaults");
                return Ok(EngineSettings::default());
            }
            Err(e) => return Err(e),
        };

        info!(path = %self.path.display(), "Loading settings");
        match serde_json::from_str::<Value>(&content) {
            Ok(value) => Ok(EngineSettings::from_value(&value)),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Settings file is not valid JSON, using defaults"
                );
                Ok(EngineSettings::default())
            }
        }
    }

    async fn save(&self, settings: &EngineSettings) -> Result<(), StoreError> {
        save_json(&self.path, settings).await?;
        debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

// ============================================================================
// In-Memory Repository
// ============================================================================

/// Settings kept in memory only.
#[derive(Debug, Default)]
pub struct MemorySettingsRepository {
    settings: RwLock<Option<EngineSettings>>,
}

impl MemorySettingsRepository {
    /// Creates an empty repository (loads yield defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository preloaded with `settings`.
    pub fn with_settings(settings: EngineSettings) -> Self {
        Self {
            settings: RwLock::new(Some(settings)),
        }
    }

    /// Returns the last saved settings, if any.
    pub async fn saved(&self) -> Option<EngineSettings> {
        self.settings.read().await.clone()
    }
}

#[async_trait]
impl SettingsRepository for MemorySettingsRepository {
    async fn load(&self) -> Result<EngineSettings, StoreError> {
        Ok(self.settings.read().await.clone().unwrap_or_default())
    }

    async fn save(&self, settings: &EngineSettings) -> Result<(), StoreError> {
        *self.settings.write().await = Some(settings.clone());
        Ok(())
    }
}
