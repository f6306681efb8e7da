// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `ManaBar` Store
//!
//! State management for `ManaBar`.
//!
//! This crate provides:
//!
//! - **`ProviderStatusStore`**: per-provider status with a watch channel
//! - **`EngineSettings`**: enabled providers, polling interval, alerts
//! - **`SettingsRepository`**: typed load/save, backed by a JSON file
//! - **Persistence**: secure JSON file helpers
//!
//! ## Usage
//!
//! ```ignore
//! use manabar_store::{JsonSettingsRepository, ProviderStatusStore, SettingsRepository};
//!
//! let repo = JsonSettingsRepository::at_default_path();
//! let settings = repo.load().await?;
//! let store = ProviderStatusStore::with_providers(&settings.enabled_providers);
//!
//! let mut rx = store.subscribe();
//! while rx.changed().await.is_ok() {
//!     println!("Status updated!");
//! }
//! ```

pub mod error;
pub mod persistence;
pub mod settings;
pub mod settings_store;
pub mod status_store;

pub use error::StoreError;
pub use persistence::{
    CONFIG_ENV_VAR, default_config_dir, default_settings_path, load_json, save_json,
};
pub use settings::{EngineSettings, PollInterval};
pub use settings_store::{JsonSettingsRepository, MemorySettingsRepository, SettingsRepository};
pub use status_store::ProviderStatusStore;
