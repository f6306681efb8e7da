//! Claude usage via the Anthropic OAuth usage endpoint.
//!
//! Credentials are the ones the Claude CLI writes to
//! `~/.claude/.credentials.json`:
//!
//! ```json
//! {
//!   "claudeAiOauth": {
//!     "accessToken": "...",
//!     "refreshToken": "...",
//!     "expiresAt": 1735000000000,
//!     "scopes": ["user:inference", "user:profile"]
//!   }
//! }
//! ```
//!
//! # API Endpoint
//!
//! ```text
//! GET https://api.anthropic.com/api/oauth/usage
//! Authorization: Bearer <access_token>
//! anthropic-beta: oauth-2025-04-20
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::FetchError;
use crate::http::HttpClient;
use crate::payload::RawWindowPayload;

// ============================================================================
// Constants
// ============================================================================

/// Base URL for the Anthropic API.
pub const API_BASE_URL: &str = "https://api.anthropic.com";

/// OAuth usage endpoint.
pub const USAGE_ENDPOINT: &str = "/api/oauth/usage";

/// Beta header value required by the OAuth endpoints.
pub const OAUTH_BETA: &str = "oauth-2025-04-20";

// ============================================================================
// Credentials
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsFile {
    claude_ai_oauth: Option<OAuthCredentialsData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OAuthCredentialsData {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    #[serde(default)]
    scopes: Vec<String>,
}

/// OAuth credentials of the Claude CLI.
#[derive(Debug, Clone)]
pub struct ClaudeCredentials {
    /// Bearer token.
    pub access_token: String,
    /// Refresh token, if present.
    pub refresh_token: Option<String>,
    /// Expiry, if the file records one.
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scopes.
    pub scopes: Vec<String>,
}

impl ClaudeCredentials {
    /// Parses the contents of a credentials file.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Auth`] if the file has no `claudeAiOauth` entry
    /// or the access token is empty.
    pub fn parse(json: &str) -> Result<Self, FetchError> {
        let file: CredentialsFile = serde_json::from_str(json)?;
        let data = file.claude_ai_oauth.ok_or_else(|| {
            FetchError::Auth(
                "no Claude OAuth credentials found; sign in with the Claude CLI".to_string(),
            )
        })?;

        if data.access_token.trim().is_empty() {
            return Err(FetchError::Auth("Claude access token is empty".to_string()));
        }

        // expiresAt is milliseconds since the epoch
        let expires_at = data.expires_at.and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        Ok(Self {
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            expires_at,
            scopes: data.scopes,
        })
    }

    /// Reads credentials from a file.
    ///
    /// # Errors
    ///
    /// A missing file is an authentication failure (the user never signed
    /// in); other IO errors are reported as-is.
    pub fn load_from(path: &Path) -> Result<Self, FetchError> {
        debug!(path = %path.display(), "Reading Claude credentials");
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::Auth(format!(
                    "Claude credentials not found at {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(&content)
    }

    /// Returns true if the token has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Default location of the Claude CLI credentials file.
pub fn credentials_file_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".claude").join(".credentials.json"))
}

// ============================================================================
// API Client
// ============================================================================

/// Client for the Claude OAuth usage endpoint.
#[derive(Debug, Clone)]
pub struct AnthropicUsageClient {
    http: HttpClient,
    base_url: String,
    credentials_path: Option<PathBuf>,
}

impl AnthropicUsageClient {
    /// Creates a client for the production API and default credentials path.
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: API_BASE_URL.to_string(),
            credentials_path: credentials_file_path(),
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the credentials file location.
    #[must_use]
    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    /// Loads credentials and rejects expired tokens.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Auth`] when credentials are missing or expired.
    pub fn credentials(&self) -> Result<ClaudeCredentials, FetchError> {
        let path = self.credentials_path.as_deref().ok_or_else(|| {
            FetchError::Auth("could not determine home directory".to_string())
        })?;
        let credentials = ClaudeCredentials::load_from(path)?;

        if credentials.is_expired_at(Utc::now()) {
            return Err(FetchError::Auth(
                "Claude OAuth token expired; run the Claude CLI to sign in again".to_string(),
            ));
        }
        Ok(credentials)
    }

    /// Fetches the current usage windows.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<RawWindowPayload, FetchError> {
        let credentials = self.credentials()?;
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), USAGE_ENDPOINT);

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", credentials.access_token))
            .map_err(|_| FetchError::Auth("access token contains invalid characters".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("anthropic-beta", HeaderValue::from_static(OAUTH_BETA));

        debug!(url = %url, "Fetching Claude usage");
        self.http.get_json(&url, headers).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CREDS: &str = r#"{
        "claudeAiOauth": {
            "accessToken": "sk-ant-oat01-test",
            "refreshToken": "sk-ant-ort01-test",
            "expiresAt": 1735000000000,
            "scopes": ["user:inference", "user:profile"]
        }
    }"#;

    #[test]
    fn test_parse_credentials() {
        let creds = ClaudeCredentials::parse(CREDS).unwrap();
        assert_eq!(creds.access_token, "sk-ant-oat01-test");
        assert_eq!(creds.expires_at.unwrap().timestamp(), 1_735_000_000);
        assert_eq!(creds.scopes.len(), 2);
    }

    #[test]
    fn test_expiry() {
        let creds = ClaudeCredentials::parse(CREDS).unwrap();
        let before = Utc.timestamp_opt(1_734_000_000, 0).unwrap();
        let after = Utc.timestamp_opt(1_736_000_000, 0).unwrap();
        assert!(!creds.is_expired_at(before));
        assert!(creds.is_expired_at(after));
    }

    #[test]
    fn test_missing_oauth_entry_is_auth_error() {
        let err = ClaudeCredentials::parse("{}").unwrap_err();
        assert!(err.is_auth());
    }

    #[test]
    fn test_missing_file_is_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClaudeCredentials::load_from(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.is_auth());
    }

    #[test]
    fn test_expired_file_rejected_by_client() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".credentials.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(CREDS.as_bytes()).unwrap();

        let client = AnthropicUsageClient::new(HttpClient::new()).with_credentials_path(&path);
        let err = client.credentials().unwrap_err();
        assert!(err.is_auth());
        assert!(err.to_string().contains("expired"));
    }
}
