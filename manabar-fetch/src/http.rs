//! HTTP client with tracing and status mapping.
//!
//! Wraps `reqwest` so provider clients get:
//! - Request/response tracing
//! - A bounded request timeout
//! - Non-success statuses mapped to [`FetchError`]

use reqwest::{Client, Response, header::HeaderMap};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::FetchError;

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent string for `ManaBar`.
const USER_AGENT: &str = concat!("ManaBar/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 200;

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper used by all provider clients.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    timeout: Duration,
}

impl HttpClient {
    /// Creates a new HTTP client with default settings.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new HTTP client with a custom timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built. This only happens when the
    /// system TLS configuration is broken, in which case no provider can be
    /// reached at all.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                panic!(
                    "Failed to create HTTP client: {e}. \
                    This usually indicates a broken TLS/SSL configuration."
                )
            });

        Self {
            inner: client,
            timeout,
        }
    }

    /// Performs a GET request with custom headers.
    ///
    /// Transport timeouts are reported as [`FetchError::Timeout`]; the
    /// response status is not checked.
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> Result<Response, FetchError> {
        debug!("GET request");

        let response = self
            .inner
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs a GET request and decodes a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Auth`] for 401/403, [`FetchError::Api`] for any
    /// other non-success status, and [`FetchError::Json`] if the body does not
    /// decode into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> Result<T, FetchError> {
        let response = self.get_with_headers(url, headers).await?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Err(FetchError::from_status(status, truncate(&body)));
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Returns the configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_send_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout.as_secs())
        } else {
            FetchError::Http(err)
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_timeout() {
        let client = HttpClient::with_timeout(Duration::from_secs(5));
        assert_eq!(client.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_truncate_error_body() {
        assert_eq!(truncate("  short  "), "short");
        let long = "x".repeat(500);
        let out = truncate(&long);
        assert_eq!(out.len(), MAX_ERROR_BODY + 3);
        assert!(out.ends_with("..."));
    }
}
