// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `ManaBar` Engine
//!
//! The usage monitoring and alert engine.
//!
//! Each poll round fetches every enabled provider concurrently, normalizes
//! the payloads, merges them into the status store, re-evaluates alert rules,
//! and pushes the result to the tray.
//!
//! ## Components
//!
//! - [`Engine`] - Public facade used by the presentation layer
//! - [`UsageNormalizer`] - Raw payload to [`manabar_core::NormalizedUsage`]
//! - [`AlertEvaluator`] - Threshold evaluation
//! - [`PollScheduler`] - Interval timer with a reentrancy guard
//! - [`NotificationDispatcher`] - Tray updates and desktop notifications
//!
//! ## Example
//!
//! ```ignore
//! use manabar_engine::Engine;
//!
//! let engine = Engine::builder(source, tray)
//!     .repository(Arc::new(JsonSettingsRepository::at_default_path()))
//!     .credentials(Arc::new(SystemKeychain::new()))
//!     .build()
//!     .await;
//!
//! engine.start().await;
//! engine.refresh_now().await;
//! for status in engine.statuses().await {
//!     println!("{}: connected={}", status.provider_id, status.connected);
//! }
//! ```

pub mod alerts;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod normalizer;
pub mod scheduler;

pub use alerts::{AlertEvaluator, Evaluation};
pub use dispatch::{
    AlertCrossing, MenuDetails, NotificationDispatcher, Remaining, TrayNotifier, TraySummary,
    TriggeredSummary, period_countdown, weekly_countdown,
};
pub use engine::{Engine, EngineBuilder};
pub use error::{EngineError, NotifyError};
pub use normalizer::{DEFAULT_PERIOD_DAYS, UsageNormalizer};
pub use scheduler::{PollScheduler, RoundFn, SchedulerState};
