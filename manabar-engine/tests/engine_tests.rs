//! End-to-end engine tests with scripted collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use manabar_core::{AlertMetric, AlertRule, FailureKind, ProviderKind};
use manabar_engine::{Engine, NotifyError, SchedulerState, TrayNotifier, TraySummary};
use manabar_fetch::{
    CredentialStore, FetchError, MemoryCredentialStore, RawCounterPayload, RawPayload, RawWindow,
    RawWindowPayload, UsageSource,
};
use manabar_store::{
    EngineSettings, MemorySettingsRepository, PollInterval, SettingsRepository, StoreError,
};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Reply {
    Window(f64),
    Counters(i64),
    AuthRejected,
    Offline,
}

#[derive(Default)]
struct ScriptedSource {
    replies: Mutex<HashMap<ProviderKind, Reply>>,
    delay: Duration,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn set(&self, provider: ProviderKind, reply: Reply) {
        self.replies.lock().unwrap().insert(provider, reply);
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UsageSource for ScriptedSource {
    async fn fetch(&self, provider: ProviderKind) -> Result<RawPayload, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self.replies.lock().unwrap().get(&provider).copied();
        match reply {
            Some(Reply::Window(period)) => Ok(RawWindowPayload {
                five_hour: Some(RawWindow::at(period)),
                seven_day: None,
            }
            .into()),
            Some(Reply::Counters(tokens)) => Ok(RawCounterPayload {
                input_tokens: Some(tokens),
                ..Default::default()
            }
            .into()),
            Some(Reply::AuthRejected) => Err(FetchError::Auth("token rejected".to_string())),
            Some(Reply::Offline) | None => Err(FetchError::Api {
                status: 503,
                message: "unavailable".to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct RecordingTray {
    updates: Mutex<Vec<TraySummary>>,
    notifications: Mutex<Vec<(String, String)>>,
}

impl RecordingTray {
    fn notifications(&self) -> Vec<(String, String)> {
        self.notifications.lock().unwrap().clone()
    }

    fn last_update(&self) -> Option<TraySummary> {
        self.updates.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TrayNotifier for RecordingTray {
    async fn update_tray(&self, summary: &TraySummary) -> Result<(), NotifyError> {
        self.updates.lock().unwrap().push(summary.clone());
        Ok(())
    }

    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        self.notifications
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

/// Repository whose first save is slow, so a later save can overtake it.
#[derive(Default)]
struct SlowFirstSave {
    inner: MemorySettingsRepository,
    saves: AtomicUsize,
}

#[async_trait]
impl SettingsRepository for SlowFirstSave {
    async fn load(&self) -> Result<EngineSettings, StoreError> {
        self.inner.load().await
    }

    async fn save(&self, settings: &EngineSettings) -> Result<(), StoreError> {
        if self.saves.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.inner.save(settings).await
    }
}

struct Harness {
    engine: Engine,
    source: Arc<ScriptedSource>,
    tray: Arc<RecordingTray>,
    repository: Arc<MemorySettingsRepository>,
    credentials: Arc<MemoryCredentialStore>,
}

async fn harness_with(settings: EngineSettings, source: ScriptedSource) -> Harness {
    let source = Arc::new(source);
    let tray = Arc::new(RecordingTray::default());
    let repository = Arc::new(MemorySettingsRepository::with_settings(settings));
    let credentials = Arc::new(MemoryCredentialStore::new());

    let engine = Engine::builder(source.clone(), tray.clone())
        .repository(repository.clone())
        .credentials(credentials.clone())
        .build()
        .await;

    Harness {
        engine,
        source,
        tray,
        repository,
        credentials,
    }
}

fn settings_for(providers: &[ProviderKind]) -> EngineSettings {
    EngineSettings {
        enabled_providers: providers.to_vec(),
        ..EngineSettings::default()
    }
}

// ============================================================================
// Poll Rounds
// ============================================================================

#[tokio::test]
async fn test_unpolled_providers_start_unconfigured() {
    let h = harness_with(EngineSettings::default(), ScriptedSource::default()).await;

    let statuses = h.engine.statuses().await;
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0].provider_id, ProviderKind::Anthropic);
    assert!(statuses.iter().all(|s| s.is_unconfigured()));
    assert_eq!(h.engine.scheduler_state(), SchedulerState::Idle);
}

#[tokio::test]
async fn test_one_failing_provider_does_not_block_others() {
    let h = harness_with(EngineSettings::default(), ScriptedSource::default()).await;
    h.source.set(ProviderKind::Anthropic, Reply::Window(40.0));
    h.source.set(ProviderKind::OpenAI, Reply::AuthRejected);

    h.engine.refresh_now().await;

    let claude = h.engine.status(ProviderKind::Anthropic).await.unwrap();
    assert!(claude.connected);
    assert_eq!(claude.utilization_window().unwrap().period_utilization, 40.0);

    let openai = h.engine.status(ProviderKind::OpenAI).await.unwrap();
    assert!(!openai.connected);
    assert!(openai.needs_reconnect());
    assert!(openai.error.as_deref().unwrap().contains("token rejected"));

    let update = h.tray.last_update().unwrap();
    assert_eq!(update.remaining.period_remaining, 60.0);
    assert_eq!(update.menu.period_line, "5-Hour: 60% remaining");
}

#[tokio::test]
async fn test_failure_keeps_previous_usage() {
    let h = harness_with(settings_for(&[ProviderKind::OpenAI]), ScriptedSource::default()).await;
    h.source.set(ProviderKind::OpenAI, Reply::Counters(1_200));
    h.engine.refresh_now().await;

    h.source.set(ProviderKind::OpenAI, Reply::Offline);
    h.engine.refresh_now().await;

    let status = h.engine.status(ProviderKind::OpenAI).await.unwrap();
    assert!(!status.connected);
    assert_eq!(status.error_kind, Some(FailureKind::Connection));
    let usage = status.usage.unwrap();
    assert_eq!(usage.as_counter().unwrap().input_tokens, 1_200);
}

#[tokio::test]
async fn test_failing_provider_keeps_usage_while_others_update() {
    let h = harness_with(EngineSettings::default(), ScriptedSource::default()).await;
    h.source.set(ProviderKind::Anthropic, Reply::Window(10.0));
    h.source.set(ProviderKind::OpenAI, Reply::Counters(1_200));
    h.engine.refresh_now().await;
    let before = h.engine.status(ProviderKind::OpenAI).await.unwrap();

    h.source.set(ProviderKind::Anthropic, Reply::Window(30.0));
    h.source.set(ProviderKind::OpenAI, Reply::Offline);
    h.engine.refresh_now().await;

    let claude = h.engine.status(ProviderKind::Anthropic).await.unwrap();
    assert!(claude.connected);
    assert_eq!(claude.utilization_window().unwrap().period_utilization, 30.0);

    let openai = h.engine.status(ProviderKind::OpenAI).await.unwrap();
    assert!(!openai.connected);
    assert_eq!(openai.error_kind, Some(FailureKind::Connection));
    assert_eq!(openai.usage, before.usage);
    assert_eq!(openai.last_updated, before.last_updated);
    assert_eq!(
        openai.usage.unwrap().as_counter().unwrap().input_tokens,
        1_200
    );
}

#[tokio::test]
async fn test_shape_mismatch_is_recorded_as_normalization_failure() {
    let h = harness_with(settings_for(&[ProviderKind::Anthropic]), ScriptedSource::default()).await;
    h.source.set(ProviderKind::Anthropic, Reply::Counters(10));

    h.engine.refresh_now().await;

    let status = h.engine.status(ProviderKind::Anthropic).await.unwrap();
    assert!(!status.connected);
    assert_eq!(status.error_kind, Some(FailureKind::Normalization));
    assert!(status.usage.is_none());
}

#[tokio::test]
async fn test_status_changes_are_observable() {
    let h = harness_with(settings_for(&[ProviderKind::Anthropic]), ScriptedSource::default()).await;
    h.source.set(ProviderKind::Anthropic, Reply::Window(10.0));
    let rx = h.engine.subscribe();
    let before = *rx.borrow();

    h.engine.refresh_now().await;

    assert!(*rx.borrow() > before);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_during_round_joins_it() {
    let h = harness_with(
        EngineSettings::default(),
        ScriptedSource::with_delay(Duration::from_secs(5)),
    )
    .await;
    h.source.set(ProviderKind::Anthropic, Reply::Window(20.0));
    h.source.set(ProviderKind::OpenAI, Reply::Counters(5));

    h.engine.start().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.engine.scheduler_state(), SchedulerState::Polling);

    h.engine.refresh_now().await;

    assert_eq!(h.source.fetches(), 2);
    assert!(h.engine.status(ProviderKind::Anthropic).await.unwrap().connected);
    h.engine.shutdown().await;
    assert_eq!(h.engine.scheduler_state(), SchedulerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_follows_interval() {
    let mut settings = settings_for(&[ProviderKind::Anthropic]);
    settings.poll_interval = PollInterval::ThirtySeconds;
    let h = harness_with(settings, ScriptedSource::default()).await;
    h.source.set(ProviderKind::Anthropic, Reply::Window(20.0));

    h.engine.start().await;
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(h.source.fetches(), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.source.fetches(), 2);

    h.engine.set_poll_interval(120).await.unwrap();
    tokio::time::sleep(Duration::from_secs(119)).await;
    assert_eq!(h.source.fetches(), 2);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.source.fetches(), 3);

    h.engine.shutdown().await;
}

// ============================================================================
// Alerts
// ============================================================================

#[tokio::test]
async fn test_alert_crossing_notifies_once_and_clears() {
    let h = harness_with(settings_for(&[ProviderKind::Anthropic]), ScriptedSource::default()).await;
    h.engine
        .upsert_alert_rule(AlertRule::new(AlertMetric::Period, 80.0).unwrap())
        .await
        .unwrap();

    h.source.set(ProviderKind::Anthropic, Reply::Window(82.0));
    h.engine.refresh_now().await;

    assert_eq!(h.engine.triggered_count(), 1);
    assert!(h.engine.alert_rules().await[0].triggered);
    let notifications = h.tray.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].0, "Usage Alert: 5-Hour Limit");
    assert!(notifications[0].1.contains("utilization at 82% (threshold: 80%)"));
    assert_eq!(h.tray.last_update().unwrap().triggered_count, 1);

    // Still above: no repeat notification.
    h.engine.refresh_now().await;
    assert_eq!(h.tray.notifications().len(), 1);

    h.source.set(ProviderKind::Anthropic, Reply::Window(79.0));
    h.engine.refresh_now().await;

    assert_eq!(h.engine.triggered_count(), 0);
    assert!(!h.engine.alert_rules().await[0].triggered);
    assert_eq!(h.tray.notifications().len(), 1);
    assert_eq!(h.tray.last_update().unwrap().triggered_count, 0);
}

#[tokio::test]
async fn test_disabling_notifications_clears_triggered_rules() {
    let h = harness_with(settings_for(&[ProviderKind::Anthropic]), ScriptedSource::default()).await;
    h.engine
        .upsert_alert_rule(AlertRule::new(AlertMetric::Period, 50.0).unwrap())
        .await
        .unwrap();
    h.source.set(ProviderKind::Anthropic, Reply::Window(90.0));
    h.engine.refresh_now().await;
    assert_eq!(h.engine.triggered_count(), 1);

    h.engine.set_notifications_enabled(false).await;

    assert_eq!(h.engine.triggered_count(), 0);
    assert!(h.engine.alert_rules().await.iter().all(|r| !r.triggered));

    h.engine.refresh_now().await;
    assert_eq!(h.engine.triggered_count(), 0);
    assert_eq!(h.tray.notifications().len(), 1);
    assert!(!h.repository.saved().await.unwrap().notifications_enabled);
}

#[tokio::test]
async fn test_invalid_alert_rule_is_rejected() {
    let h = harness_with(EngineSettings::default(), ScriptedSource::default()).await;
    let mut rule = AlertRule::new(AlertMetric::Weekly, 50.0).unwrap();
    rule.threshold_percent = 140.0;

    let err = h.engine.upsert_alert_rule(rule).await.unwrap_err();
    assert!(err.is_validation());
    assert!(h.engine.alert_rules().await.is_empty());
}

#[tokio::test]
async fn test_upsert_replaces_and_delete_removes() {
    let h = harness_with(EngineSettings::default(), ScriptedSource::default()).await;
    let rule = AlertRule::new(AlertMetric::Weekly, 50.0).unwrap();
    h.engine.upsert_alert_rule(rule.clone()).await.unwrap();

    let mut edited = rule.clone();
    edited.threshold_percent = 75.0;
    h.engine.upsert_alert_rule(edited).await.unwrap();

    let rules = h.engine.alert_rules().await;
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].threshold_percent, 75.0);

    assert!(h.engine.delete_alert_rule(&rule.id).await);
    assert!(!h.engine.delete_alert_rule(&rule.id).await);
    assert!(h.repository.saved().await.unwrap().usage_alerts.is_empty());
}

// ============================================================================
// Providers, Settings & Credentials
// ============================================================================

#[tokio::test]
async fn test_add_provider_persists_and_is_idempotent() {
    let h = harness_with(EngineSettings::default(), ScriptedSource::default()).await;

    assert!(h.engine.add_provider(ProviderKind::Google).await);
    assert!(!h.engine.add_provider(ProviderKind::Google).await);

    let saved = h.repository.saved().await.unwrap();
    assert_eq!(
        saved.enabled_providers,
        vec![ProviderKind::Anthropic, ProviderKind::OpenAI, ProviderKind::Google]
    );
    assert!(
        h.engine
            .status(ProviderKind::Google)
            .await
            .unwrap()
            .is_unconfigured()
    );
}

#[tokio::test]
async fn test_remove_provider_is_idempotent() {
    let h = harness_with(EngineSettings::default(), ScriptedSource::default()).await;
    h.engine
        .save_credential(ProviderKind::OpenAI, "sk-test")
        .await
        .unwrap();

    assert!(h.engine.remove_provider(ProviderKind::OpenAI).await);
    assert!(!h.engine.remove_provider(ProviderKind::OpenAI).await);

    assert!(h.engine.status(ProviderKind::OpenAI).await.is_none());
    assert_eq!(h.engine.enabled_providers().await, vec![ProviderKind::Anthropic]);
    assert!(!h.credentials.exists(ProviderKind::OpenAI).await);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_idles_without_providers() {
    let h = harness_with(settings_for(&[]), ScriptedSource::default()).await;
    h.source.set(ProviderKind::Anthropic, Reply::Window(5.0));

    h.engine.start().await;
    assert_eq!(h.engine.scheduler_state(), SchedulerState::Idle);

    h.engine.add_provider(ProviderKind::Anthropic).await;
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_ne!(h.engine.scheduler_state(), SchedulerState::Idle);
    assert_eq!(h.source.fetches(), 1);

    h.engine.remove_provider(ProviderKind::Anthropic).await;
    assert_eq!(h.engine.scheduler_state(), SchedulerState::Idle);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.source.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_readding_provider_during_round_resumes_polling() {
    let h = harness_with(
        settings_for(&[ProviderKind::Anthropic]),
        ScriptedSource::with_delay(Duration::from_secs(5)),
    )
    .await;
    h.source.set(ProviderKind::Anthropic, Reply::Window(15.0));

    h.engine.start().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.engine.scheduler_state(), SchedulerState::Polling);

    h.engine.remove_provider(ProviderKind::Anthropic).await;
    h.engine.add_provider(ProviderKind::Anthropic).await;

    // The opening round of the re-armed timer runs once the old round ends.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.source.fetches(), 2);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert!(h.source.fetches() > 2);
    assert_ne!(h.engine.scheduler_state(), SchedulerState::Idle);
    h.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_changes_persist_newest_settings() {
    let repository = Arc::new(SlowFirstSave::default());
    let engine = Engine::builder(
        Arc::new(ScriptedSource::default()),
        Arc::new(RecordingTray::default()),
    )
    .repository(repository.clone())
    .build()
    .await;

    let (_, interval) = tokio::join!(
        engine.set_notifications_enabled(false),
        engine.set_poll_interval(300)
    );
    interval.unwrap();

    let saved = repository.inner.saved().await.unwrap();
    assert_eq!(saved, engine.settings().await);
    assert_eq!(saved.poll_interval, PollInterval::FiveMinutes);
    assert!(!saved.notifications_enabled);
}

#[tokio::test]
async fn test_invalid_interval_is_rejected() {
    let h = harness_with(EngineSettings::default(), ScriptedSource::default()).await;

    let err = h.engine.set_poll_interval(45).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(h.engine.poll_interval().await, PollInterval::OneMinute);

    h.engine.set_poll_interval(300).await.unwrap();
    assert_eq!(h.engine.poll_interval().await, PollInterval::FiveMinutes);
    assert_eq!(
        h.repository.saved().await.unwrap().poll_interval,
        PollInterval::FiveMinutes
    );
}

#[tokio::test]
async fn test_credentials() {
    let h = harness_with(EngineSettings::default(), ScriptedSource::default()).await;

    let err = h
        .engine
        .save_credential(ProviderKind::OpenAI, "   ")
        .await
        .unwrap_err();
    assert!(err.is_validation());

    h.engine
        .save_credential(ProviderKind::OpenAI, " sk-abc ")
        .await
        .unwrap();
    assert!(h.engine.has_credential(ProviderKind::OpenAI).await);
    assert_eq!(
        h.credentials.get(ProviderKind::OpenAI).await.unwrap().as_deref(),
        Some("sk-abc")
    );

    h.engine.remove_credential(ProviderKind::OpenAI).await.unwrap();
    h.engine.remove_credential(ProviderKind::OpenAI).await.unwrap();
    assert!(!h.engine.has_credential(ProviderKind::OpenAI).await);
}

#[tokio::test]
async fn test_saving_credential_polls_the_provider() {
    let h = harness_with(EngineSettings::default(), ScriptedSource::default()).await;
    h.source.set(ProviderKind::OpenAI, Reply::AuthRejected);

    let status = h
        .engine
        .save_credential(ProviderKind::OpenAI, "sk-bad")
        .await
        .unwrap()
        .unwrap();
    assert!(status.needs_reconnect());
    assert_eq!(h.source.fetches(), 1);

    h.source.set(ProviderKind::OpenAI, Reply::Counters(50));
    let status = h
        .engine
        .save_credential(ProviderKind::OpenAI, "sk-good")
        .await
        .unwrap()
        .unwrap();
    assert!(status.connected);
    assert_eq!(h.source.fetches(), 2);

    // Not enabled: stored, but nothing to poll.
    let status = h
        .engine
        .save_credential(ProviderKind::Google, "g-key")
        .await
        .unwrap();
    assert!(status.is_none());
    assert_eq!(h.source.fetches(), 2);
    assert!(h.engine.has_credential(ProviderKind::Google).await);
}

#[tokio::test]
async fn test_removing_credential_disconnects_provider() {
    let h = harness_with(EngineSettings::default(), ScriptedSource::default()).await;
    h.source.set(ProviderKind::Anthropic, Reply::Window(25.0));
    h.source.set(ProviderKind::OpenAI, Reply::Counters(800));
    h.engine.refresh_now().await;

    h.engine.remove_credential(ProviderKind::OpenAI).await.unwrap();

    let openai = h.engine.status(ProviderKind::OpenAI).await.unwrap();
    assert!(!openai.connected);
    assert!(openai.usage.is_none());
    assert!(openai.is_unconfigured());

    // OAuth tokens are not in the keychain; the status stays as polled.
    h.engine.remove_credential(ProviderKind::Anthropic).await.unwrap();
    assert!(h.engine.status(ProviderKind::Anthropic).await.unwrap().connected);
}
