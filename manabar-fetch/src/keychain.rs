//! Secure credential storage using the system keychain.
//!
//! API keys are stored per provider:
//! - macOS: Keychain Services
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KDE Wallet)
//!
//! Each provider gets its own service name (`ManaBar-<provider id>`) under a
//! single `api_key` account.

use std::collections::HashMap;

use async_trait::async_trait;
use keyring::Entry;
use manabar_core::ProviderKind;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::KeychainError;

/// Service name prefix for `ManaBar` credentials.
const SERVICE_PREFIX: &str = "ManaBar";

/// Account under which API keys are stored.
pub const API_KEY_ACCOUNT: &str = "api_key";

// ============================================================================
// Credential Store Trait
// ============================================================================

/// Storage for per-provider secrets.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the stored secret for a provider.
    ///
    /// `Ok(None)` means no credential is stored.
    async fn get(&self, provider: ProviderKind) -> Result<Option<String>, KeychainError>;

    /// Stores (or replaces) the secret for a provider.
    async fn save(&self, provider: ProviderKind, secret: &str) -> Result<(), KeychainError>;

    /// Deletes the secret for a provider. Deleting a missing entry succeeds.
    async fn remove(&self, provider: ProviderKind) -> Result<(), KeychainError>;

    /// Returns true if a credential is stored.
    async fn exists(&self, provider: ProviderKind) -> bool {
        matches!(self.get(provider).await, Ok(Some(_)))
    }
}

// ============================================================================
// System Keychain Implementation
// ============================================================================

/// Credential store backed by the system keychain via `keyring`.
#[derive(Debug, Clone, Default)]
pub struct SystemKeychain;

impl SystemKeychain {
    /// Creates a new system keychain instance.
    pub fn new() -> Self {
        Self
    }

    /// Builds the keychain service name for a provider.
    pub fn service_name(provider: ProviderKind) -> String {
        format!("{SERVICE_PREFIX}-{}", provider.id())
    }

    fn entry(provider: ProviderKind) -> Result<Entry, KeychainError> {
        Entry::new(&Self::service_name(provider), API_KEY_ACCOUNT)
            .map_err(|e| KeychainError::Platform(e.to_string()))
    }
}

#[async_trait]
impl CredentialStore for SystemKeychain {
    async fn get(&self, provider: ProviderKind) -> Result<Option<String>, KeychainError> {
        debug!(provider = %provider, "Getting credential from keychain");

        let entry = Self::entry(provider)?;

        match entry.get_password() {
            Ok(secret) if !secret.is_empty() => Ok(Some(secret)),
            Ok(_) | Err(keyring::Error::NoEntry) => {
                debug!(provider = %provider, "Credential not found");
                Ok(None)
            }
            Err(e) => {
                warn!(provider = %provider, error = %e, "Failed to get credential");
                Err(e.into())
            }
        }
    }

    async fn save(&self, provider: ProviderKind, secret: &str) -> Result<(), KeychainError> {
        debug!(provider = %provider, "Storing credential in keychain");

        let entry = Self::entry(provider)?;

        entry.set_password(secret).map_err(|e| {
            warn!(provider = %provider, error = %e, "Failed to store credential");
            KeychainError::from(e)
        })
    }

    async fn remove(&self, provider: ProviderKind) -> Result<(), KeychainError> {
        debug!(provider = %provider, "Deleting credential from keychain");

        let entry = Self::entry(provider)?;

        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => {
                debug!(provider = %provider, "Credential not found (already deleted)");
                Ok(())
            }
            Err(e) => {
                warn!(provider = %provider, error = %e, "Failed to delete credential");
                Err(e.into())
            }
        }
    }
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

/// Process-local credential store.
///
/// Used when no keychain is available (headless CI, containers) and in tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    secrets: RwLock<HashMap<ProviderKind, String>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, provider: ProviderKind) -> Result<Option<String>, KeychainError> {
        Ok(self.secrets.read().await.get(&provider).cloned())
    }

    async fn save(&self, provider: ProviderKind, secret: &str) -> Result<(), KeychainError> {
        self.secrets
            .write()
            .await
            .insert(provider, secret.to_string());
        Ok(())
    }

    async fn remove(&self, provider: ProviderKind) -> Result<(), KeychainError> {
        self.secrets.write().await.remove(&provider);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name() {
        assert_eq!(
            SystemKeychain::service_name(ProviderKind::OpenAI),
            "ManaBar-openai"
        );
        assert_eq!(
            SystemKeychain::service_name(ProviderKind::Anthropic),
            "ManaBar-anthropic"
        );
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryCredentialStore::new();
        assert!(!store.exists(ProviderKind::OpenAI).await);

        store.save(ProviderKind::OpenAI, "sk-admin").await.unwrap();
        assert_eq!(
            store.get(ProviderKind::OpenAI).await.unwrap().as_deref(),
            Some("sk-admin")
        );

        store.remove(ProviderKind::OpenAI).await.unwrap();
        store.remove(ProviderKind::OpenAI).await.unwrap();
        assert!(store.get(ProviderKind::OpenAI).await.unwrap().is_none());
    }

    // Real keychain access needs a platform session and is not exercised here.
}
