//! Provider status store.
//!
//! The authoritative map of provider id to [`ProviderStatus`]. Every
//! mutation happens inside a single write-lock section and bumps a version
//! counter that subscribers can watch.

use std::collections::HashMap;

use chrono::Utc;
use manabar_core::{NormalizedUsage, ProviderKind, ProviderStatus, UsageFailure};
use tokio::sync::{RwLock, watch};
use tracing::debug;

// ============================================================================
// Provider Status Store
// ============================================================================

/// In-memory, observable status map.
pub struct ProviderStatusStore {
    statuses: RwLock<HashMap<ProviderKind, ProviderStatus>>,
    notify: watch::Sender<u64>,
}

impl Default for ProviderStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderStatusStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            statuses: RwLock::new(HashMap::new()),
            notify,
        }
    }

    /// Creates a store with an unconfigured entry per provider.
    pub fn with_providers(providers: &[ProviderKind]) -> Self {
        let statuses = providers
            .iter()
            .map(|p| (*p, ProviderStatus::unconfigured(*p)))
            .collect();
        let (notify, _) = watch::channel(0);
        Self {
            statuses: RwLock::new(statuses),
            notify,
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Returns a copy of one provider's status.
    pub async fn get(&self, provider: ProviderKind) -> Option<ProviderStatus> {
        self.statuses.read().await.get(&provider).cloned()
    }

    /// Returns a copy of every status.
    pub async fn all(&self) -> HashMap<ProviderKind, ProviderStatus> {
        self.statuses.read().await.clone()
    }

    /// Returns statuses in the given order, skipping providers with no entry.
    pub async fn ordered(&self, order: &[ProviderKind]) -> Vec<ProviderStatus> {
        let statuses = self.statuses.read().await;
        order.iter().filter_map(|p| statuses.get(p).cloned()).collect()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Creates an unconfigured entry unless one exists.
    ///
    /// Returns true if an entry was created.
    pub async fn ensure(&self, provider: ProviderKind) -> bool {
        let created = {
            let mut statuses = self.statuses.write().await;
            if statuses.contains_key(&provider) {
                false
            } else {
                statuses.insert(provider, ProviderStatus::unconfigured(provider));
                true
            }
        };
        if created {
            debug!(provider = %provider, "Status entry created");
            self.notify_change();
        }
        created
    }

    /// Merges a fetch result into a provider's status.
    ///
    /// Success replaces usage and stamps `last_updated`; failure records the
    /// error and keeps the previous usage. Results for providers without an
    /// entry (removed while the fetch was in flight) are dropped and `None`
    /// is returned.
    pub async fn merge<E>(
        &self,
        provider: ProviderKind,
        result: Result<NormalizedUsage, E>,
    ) -> Option<ProviderStatus>
    where
        E: Into<UsageFailure>,
    {
        let merged = {
            let mut statuses = self.statuses.write().await;
            let Some(status) = statuses.get_mut(&provider) else {
                debug!(provider = %provider, "Dropping result for removed provider");
                return None;
            };
            match result {
                Ok(usage) => status.apply_success(usage, Utc::now()),
                Err(err) => status.apply_failure(err.into()),
            }
            status.clone()
        };
        self.notify_change();
        Some(merged)
    }

    /// Puts an existing entry back into the unconfigured state, dropping its
    /// usage and error.
    ///
    /// Returns true if the provider had an entry.
    pub async fn reset(&self, provider: ProviderKind) -> bool {
        let reset = match self.statuses.write().await.get_mut(&provider) {
            Some(status) => {
                *status = ProviderStatus::unconfigured(provider);
                true
            }
            None => false,
        };
        if reset {
            debug!(provider = %provider, "Status entry reset");
            self.notify_change();
        }
        reset
    }

    /// Removes a provider's entry. Removing a missing entry is a no-op.
    ///
    /// Returns true if an entry was removed.
    pub async fn remove(&self, provider: ProviderKind) -> bool {
        let removed = self.statuses.write().await.remove(&provider).is_some();
        if removed {
            debug!(provider = %provider, "Status entry removed");
            self.notify_change();
        }
        removed
    }

    // ========================================================================
    // Observable
    // ========================================================================

    /// Subscribes to store changes.
    ///
    /// The value is a version counter bumped on every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }

    /// Current version counter.
    pub fn version(&self) -> u64 {
        *self.notify.borrow()
    }

    fn notify_change(&self) {
        self.notify.send_modify(|version| *version += 1);
    }
}

// ============================================================================
// Tests
// ============================================================================
