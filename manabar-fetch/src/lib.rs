// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `ManaBar` Fetch
//!
//! Usage fetching and credential access for `ManaBar`.
//!
//! - [`source::UsageSource`] - The fetch seam the engine polls through
//! - [`source::HttpUsageSource`] - Dispatches to per-provider HTTP clients
//! - [`anthropic`] - Claude OAuth usage windows
//! - [`openai`] - `OpenAI` organization usage and cost counters
//! - [`keychain`] - System keychain credential store
//! - [`payload`] - Raw, provider-specific payloads (pre-normalization)
//!
//! ## Example
//!
//! ```ignore
//! use manabar_fetch::{HttpUsageSource, UsageSource};
//! use manabar_core::ProviderKind;
//!
//! let source = HttpUsageSource::new(Arc::new(SystemKeychain::new()));
//! let raw = source.fetch(ProviderKind::Anthropic).await?;
//! ```

pub mod anthropic;
pub mod error;
pub mod http;
pub mod keychain;
pub mod openai;
pub mod payload;
pub mod source;

// Errors
pub use error::{FetchError, KeychainError};

// Host APIs
pub use http::HttpClient;
pub use keychain::{CredentialStore, MemoryCredentialStore, SystemKeychain};

// Payloads & sources
pub use payload::{RawCounterPayload, RawPayload, RawWindow, RawWindowPayload};
pub use source::{HttpUsageSource, UsageSource};
