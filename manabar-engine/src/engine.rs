//! The usage monitoring engine.
//!
//! Owns the status store, the settings, and the poll scheduler, and exposes
//! every operation the presentation layer needs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use futures::future::join_all;
use manabar_core::{AlertRule, AuthMethod, ProviderKind, ProviderStatus, UsageFailure, UsageShape};
use manabar_fetch::{CredentialStore, MemoryCredentialStore, UsageSource};
use manabar_store::{
    EngineSettings, MemorySettingsRepository, PollInterval, ProviderStatusStore, SettingsRepository,
};
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, error, info, warn};

use crate::alerts::AlertEvaluator;
use crate::dispatch::{
    AlertCrossing, MenuDetails, NotificationDispatcher, Remaining, TrayNotifier, TriggeredSummary,
};
use crate::error::EngineError;
use crate::normalizer::UsageNormalizer;
use crate::scheduler::{PollScheduler, SchedulerState};

// ============================================================================
// Builder
// ============================================================================

/// Builds an [`Engine`].
pub struct EngineBuilder {
    source: Arc<dyn UsageSource>,
    tray: Arc<dyn TrayNotifier>,
    repository: Arc<dyn SettingsRepository>,
    credentials: Arc<dyn CredentialStore>,
}

impl EngineBuilder {
    /// Sets the settings repository. Defaults to an in-memory one.
    #[must_use]
    pub fn repository(mut self, repository: Arc<dyn SettingsRepository>) -> Self {
        self.repository = repository;
        self
    }

    /// Sets the credential store. Defaults to an in-memory one.
    #[must_use]
    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Loads settings and builds the engine. Polling does not start until
    /// [`Engine::start`].
    ///
    /// Unreadable settings fall back to the defaults.
    pub async fn build(self) -> Engine {
        let settings = match self.repository.load().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Failed to load settings, using defaults");
                EngineSettings::default()
            }
        };
        debug!(
            providers = settings.enabled_providers.len(),
            interval = %settings.poll_interval,
            alerts = settings.usage_alerts.len(),
            "Engine settings loaded"
        );

        let store = ProviderStatusStore::with_providers(&settings.enabled_providers);

        let inner = Arc::new_cyclic(|weak: &Weak<EngineInner>| {
            let weak = weak.clone();
            EngineInner {
                source: self.source,
                store,
                settings: RwLock::new(settings),
                repository: self.repository,
                save_lock: Mutex::new(()),
                credentials: self.credentials,
                dispatcher: NotificationDispatcher::new(self.tray),
                triggered_count: AtomicUsize::new(0),
                started: AtomicBool::new(false),
                scheduler: PollScheduler::from_fn(move || {
                    let weak = weak.clone();
                    async move {
                        if let Some(inner) = weak.upgrade() {
                            inner.poll_round().await;
                        }
                    }
                }),
            }
        });

        Engine { inner }
    }
}

// ============================================================================
// Engine
// ============================================================================

struct EngineInner {
    source: Arc<dyn UsageSource>,
    store: ProviderStatusStore,
    settings: RwLock<EngineSettings>,
    repository: Arc<dyn SettingsRepository>,
    /// Serializes saves so the last write always carries the newest settings.
    save_lock: Mutex<()>,
    credentials: Arc<dyn CredentialStore>,
    dispatcher: NotificationDispatcher,
    triggered_count: AtomicUsize,
    started: AtomicBool,
    scheduler: PollScheduler,
}

/// Usage monitoring and alert engine.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Starts building an engine around a usage source and a tray.
    pub fn builder(source: Arc<dyn UsageSource>, tray: Arc<dyn TrayNotifier>) -> EngineBuilder {
        EngineBuilder {
            source,
            tray,
            repository: Arc::new(MemorySettingsRepository::new()),
            credentials: Arc::new(MemoryCredentialStore::new()),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Starts periodic polling. The first round runs immediately.
    ///
    /// With no enabled providers the scheduler stays idle until one is
    /// added.
    pub async fn start(&self) {
        self.inner.started.store(true, Ordering::Release);
        let (empty, interval) = {
            let settings = self.inner.settings.read().await;
            (settings.enabled_providers.is_empty(), settings.poll_interval)
        };
        if empty {
            info!("No providers enabled, polling stays idle");
            return;
        }
        self.inner.scheduler.start(interval.as_duration()).await;
    }

    /// Stops periodic polling. Rounds already in flight complete normally.
    pub async fn shutdown(&self) {
        self.inner.started.store(false, Ordering::Release);
        self.inner.scheduler.stop().await;
    }

    /// Current scheduler state.
    pub fn scheduler_state(&self) -> SchedulerState {
        self.inner.scheduler.state()
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Status of one provider.
    pub async fn status(&self, provider: ProviderKind) -> Option<ProviderStatus> {
        self.inner.store.get(provider).await
    }

    /// Statuses of all enabled providers, in display order.
    pub async fn statuses(&self) -> Vec<ProviderStatus> {
        let order = self.inner.settings.read().await.enabled_providers.clone();
        self.inner.store.ordered(&order).await
    }

    /// Subscribes to status changes (version counter).
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.store.subscribe()
    }

    /// Subscribes to completed poll rounds.
    pub fn subscribe_rounds(&self) -> watch::Receiver<u64> {
        self.inner.scheduler.subscribe_rounds()
    }

    /// Polls every enabled provider now.
    ///
    /// If a round is already in flight, waits for it instead of starting
    /// another.
    pub async fn refresh_now(&self) {
        self.inner.scheduler.trigger_now().await;
    }

    // ========================================================================
    // Providers
    // ========================================================================

    /// Enabled providers in display order.
    pub async fn enabled_providers(&self) -> Vec<ProviderKind> {
        self.inner.settings.read().await.enabled_providers.clone()
    }

    /// Enables a provider. Adding an enabled provider is a no-op.
    ///
    /// Returns true if the provider was added. Polling resumes if this is the
    /// first provider of a started engine.
    pub async fn add_provider(&self, provider: ProviderKind) -> bool {
        let (added, interval) = {
            let mut settings = self.inner.settings.write().await;
            let added = settings.add_provider(provider);
            if added {
                self.inner.store.ensure(provider).await;
            }
            (added, settings.poll_interval)
        };
        if !added {
            debug!(provider = %provider, "Provider already enabled");
            return false;
        }

        info!(provider = %provider, "Provider added");
        self.inner.persist().await;

        // No-op while the timer is armed, even if a round is still in flight.
        if self.inner.started.load(Ordering::Acquire) {
            self.inner.scheduler.start(interval.as_duration()).await;
        }
        true
    }

    /// Disables a provider, drops its status, and deletes its stored
    /// credential. Removing a provider that is not enabled is a no-op.
    ///
    /// Returns true if the provider was enabled.
    pub async fn remove_provider(&self, provider: ProviderKind) -> bool {
        let (removed, now_empty) = {
            let mut settings = self.inner.settings.write().await;
            let removed = settings.remove_provider(provider);
            (removed, settings.enabled_providers.is_empty())
        };
        self.inner.store.remove(provider).await;

        if !removed {
            return false;
        }

        info!(provider = %provider, "Provider removed");
        self.inner.persist().await;

        if let Err(e) = self.inner.credentials.remove(provider).await {
            warn!(provider = %provider, error = %e, "Failed to delete credential");
        }

        if now_empty {
            self.inner.scheduler.stop().await;
        }
        self.inner.reevaluate(false).await;
        true
    }

    // ========================================================================
    // Alerts
    // ========================================================================

    /// Alert rules with their current `triggered` state.
    pub async fn alert_rules(&self) -> Vec<AlertRule> {
        self.inner.settings.read().await.usage_alerts.clone()
    }

    /// Number of enabled, triggered rules.
    pub fn triggered_count(&self) -> usize {
        self.inner.triggered_count.load(Ordering::Acquire)
    }

    /// Adds a rule, or replaces the rule with the same id.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` for an empty id or a threshold
    /// outside `[0, 100]`.
    pub async fn upsert_alert_rule(&self, rule: AlertRule) -> Result<(), EngineError> {
        rule.validate()?;
        self.inner.settings.write().await.upsert_alert(rule);
        self.inner.persist().await;
        self.inner.reevaluate(false).await;
        Ok(())
    }

    /// Deletes a rule by id. Returns false if no rule had that id.
    pub async fn delete_alert_rule(&self, id: &str) -> bool {
        let deleted = self.inner.settings.write().await.delete_alert(id);
        if deleted {
            self.inner.persist().await;
            self.inner.reevaluate(false).await;
        }
        deleted
    }

    /// Whether notifications (and alert evaluation) are on.
    pub async fn notifications_enabled(&self) -> bool {
        self.inner.settings.read().await.notifications_enabled
    }

    /// Turns notifications on or off. Turning them off clears every
    /// triggered flag.
    pub async fn set_notifications_enabled(&self, enabled: bool) {
        {
            let mut settings = self.inner.settings.write().await;
            if settings.notifications_enabled == enabled {
                return;
            }
            settings.notifications_enabled = enabled;
        }
        info!(enabled, "Notifications toggled");
        self.inner.persist().await;
        self.inner.reevaluate(false).await;
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Current polling interval.
    pub async fn poll_interval(&self) -> PollInterval {
        self.inner.settings.read().await.poll_interval
    }

    /// Changes the polling interval and re-arms the timer.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` for anything but 30, 60, 120 or 300
    /// seconds.
    pub async fn set_poll_interval(&self, seconds: u64) -> Result<(), EngineError> {
        let interval = PollInterval::from_secs(seconds)?;
        self.inner.settings.write().await.poll_interval = interval;
        info!(interval = %interval, "Polling interval changed");
        self.inner.persist().await;
        self.inner.scheduler.set_interval(interval.as_duration()).await;
        Ok(())
    }

    /// A copy of the current settings.
    pub async fn settings(&self) -> EngineSettings {
        self.inner.settings.read().await.clone()
    }

    // ========================================================================
    // Credentials
    // ========================================================================

    /// Stores an API key for a provider and, if the provider is enabled,
    /// polls it straight away so a rejected key shows up immediately.
    ///
    /// Returns the provider's status after that poll, or `None` if the
    /// provider is not enabled.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` for a blank secret, or
    /// `EngineError::Credential` if the store rejects it.
    pub async fn save_credential(
        &self,
        provider: ProviderKind,
        secret: &str,
    ) -> Result<Option<ProviderStatus>, EngineError> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(EngineError::Validation(
                "credential must not be empty".to_string(),
            ));
        }
        self.inner.credentials.save(provider, secret).await?;
        info!(provider = %provider, "Credential saved");

        let enabled = self
            .inner
            .settings
            .read()
            .await
            .enabled_providers
            .contains(&provider);
        if !enabled {
            return Ok(None);
        }
        self.inner.poll_provider(provider).await;
        self.inner.reevaluate(true).await;
        Ok(self.inner.store.get(provider).await)
    }

    /// Deletes a provider's stored API key. Deleting a missing key succeeds.
    ///
    /// An enabled API-key provider drops back to unconfigured, so its old
    /// usage stops showing.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Credential` if the store fails.
    pub async fn remove_credential(&self, provider: ProviderKind) -> Result<(), EngineError> {
        self.inner.credentials.remove(provider).await?;
        info!(provider = %provider, "Credential removed");

        if provider.auth_method() == AuthMethod::ApiKey && self.inner.store.reset(provider).await {
            self.inner.reevaluate(false).await;
        }
        Ok(())
    }

    /// Returns true if a credential is stored for the provider.
    pub async fn has_credential(&self, provider: ProviderKind) -> bool {
        self.inner.credentials.exists(provider).await
    }
}

// ============================================================================
// Internals
// ============================================================================

impl EngineInner {
    /// Fetches every enabled provider concurrently, then re-evaluates alerts
    /// and dispatches.
    async fn poll_round(&self) {
        let providers = self.settings.read().await.enabled_providers.clone();
        if providers.is_empty() {
            debug!("No providers enabled, skipping round");
            return;
        }

        debug!(providers = providers.len(), "Poll round started");
        join_all(providers.iter().map(|&provider| self.poll_provider(provider))).await;
        self.reevaluate(true).await;
        debug!("Poll round finished");
    }

    async fn poll_provider(&self, provider: ProviderKind) {
        let result = match self.source.fetch(provider).await {
            Ok(raw) => UsageNormalizer::normalize(provider, &raw).map_err(|e| {
                error!(
                    provider = %provider,
                    error = %e,
                    "Usage payload could not be normalized"
                );
                UsageFailure::from(e)
            }),
            Err(e) => {
                if e.is_auth() {
                    warn!(provider = %provider, error = %e, "Provider needs reconnect");
                } else {
                    warn!(
                        provider = %provider,
                        error = %e,
                        transient = e.is_transient(),
                        "Usage fetch failed"
                    );
                }
                Err(UsageFailure::from(e))
            }
        };

        if self.store.merge(provider, result).await.is_none() {
            debug!(provider = %provider, "Provider removed during fetch");
        }
    }

    /// Recomputes triggered state and pushes figures to the tray.
    ///
    /// Desktop notifications for new crossings are only sent after a poll;
    /// configuration changes only refresh the tray.
    async fn reevaluate(&self, after_poll: bool) {
        let (remaining, menu, triggered) = {
            let mut settings = self.settings.write().await;
            let statuses = self.store.ordered(&settings.enabled_providers).await;

            let evaluation = AlertEvaluator::evaluate(
                &settings.usage_alerts,
                &statuses,
                settings.notifications_enabled,
            );

            let newly_triggered = if after_poll {
                AlertEvaluator::newly_triggered(&settings.usage_alerts, &evaluation.rules)
                    .into_iter()
                    .map(|rule| {
                        AlertCrossing::new(rule, AlertEvaluator::window_for(rule, &statuses))
                    })
                    .collect()
            } else {
                Vec::new()
            };

            let count = evaluation.triggered_count;
            settings.usage_alerts = evaluation.rules;
            self.triggered_count.store(count, Ordering::Release);

            let primary = statuses
                .iter()
                .find(|s| s.provider_id.usage_shape() == UsageShape::UtilizationWindow);
            (
                Remaining::from_window(primary.and_then(ProviderStatus::utilization_window)),
                MenuDetails::from_status(primary, Utc::now()),
                TriggeredSummary {
                    count,
                    newly_triggered,
                },
            )
        };

        self.dispatcher.dispatch(remaining, menu, &triggered).await;
    }

    /// Saves the current settings. Saves run one at a time and each reads
    /// the settings afresh, so a slow save never overwrites a newer one.
    async fn persist(&self) {
        let _saving = self.save_lock.lock().await;
        let settings = self.settings.read().await.clone();
        if let Err(e) = self.repository.save(&settings).await {
            warn!(error = %e, "Failed to save settings, keeping in-memory copy");
        }
    }
}
