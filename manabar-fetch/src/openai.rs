//! `OpenAI` usage via the organization usage and cost endpoints.
//!
//! Requires an admin API key, stored in the keychain under the `openai`
//! provider.
//!
//! # API Endpoints
//!
//! ```text
//! GET https://api.openai.com/v1/organization/usage/completions?start_time=..
//! GET https://api.openai.com/v1/organization/costs?start_time=..
//!     (both with bucket_width=1d&limit=30)
//! Authorization: Bearer <admin key>
//! ```
//!
//! Both return daily buckets; the client sums them into one
//! [`RawCounterPayload`].

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::error::FetchError;
use crate::http::HttpClient;
use crate::payload::RawCounterPayload;

// ============================================================================
// Constants
// ============================================================================

/// Base URL for the `OpenAI` API.
pub const API_BASE_URL: &str = "https://api.openai.com/v1";

/// Trailing period covered by one fetch.
pub const PERIOD_DAYS: u32 = 30;

// ============================================================================
// API Response Structures
// ============================================================================

/// One page of bucketed results.
#[derive(Debug, Clone, Deserialize)]
pub struct BucketPage<R> {
    /// Daily buckets.
    #[serde(default = "Vec::new")]
    pub data: Vec<Bucket<R>>,
}

/// One time bucket.
#[derive(Debug, Clone, Deserialize)]
pub struct Bucket<R> {
    /// Results in this bucket (one per grouping).
    #[serde(default = "Vec::new")]
    pub results: Vec<R>,
}

/// A completions usage result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionsResult {
    /// Input tokens.
    #[serde(default)]
    pub input_tokens: i64,
    /// Output tokens.
    #[serde(default)]
    pub output_tokens: i64,
    /// Number of model requests.
    #[serde(default)]
    pub num_model_requests: i64,
}

/// A cost result.
#[derive(Debug, Clone, Deserialize)]
pub struct CostResult {
    /// Amount charged.
    pub amount: Option<CostAmount>,
}

/// A monetary amount.
#[derive(Debug, Clone, Deserialize)]
pub struct CostAmount {
    /// Value in `currency` units.
    #[serde(default)]
    pub value: f64,
    /// Currency code, normally `usd`.
    #[serde(default)]
    pub currency: Option<String>,
}

/// Sums usage and cost pages into one counter payload.
///
/// A missing cost page leaves `total_cost_usd` unset.
pub fn summarize(
    usage: &BucketPage<CompletionsResult>,
    costs: Option<&BucketPage<CostResult>>,
    period_days: u32,
) -> RawCounterPayload {
    let results = usage.data.iter().flat_map(|bucket| bucket.results.iter());

    let (input, output, requests) = results.fold((0i64, 0i64, 0i64), |acc, r| {
        (
            acc.0.saturating_add(r.input_tokens),
            acc.1.saturating_add(r.output_tokens),
            acc.2.saturating_add(r.num_model_requests),
        )
    });

    let cost = costs.map(|page| {
        page.data
            .iter()
            .flat_map(|bucket| bucket.results.iter())
            .filter_map(|r| r.amount.as_ref())
            .filter(|a| a.currency.as_deref().is_none_or(|c| c.eq_ignore_ascii_case("usd")))
            .map(|a| a.value)
            .sum::<f64>()
    });

    RawCounterPayload {
        input_tokens: Some(input),
        output_tokens: Some(output),
        total_requests: Some(requests),
        total_cost_usd: cost,
        period_days: Some(period_days),
    }
}

// ============================================================================
// API Client
// ============================================================================

/// Client for the `OpenAI` organization usage endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiUsageClient {
    http: HttpClient,
    base_url: String,
}

impl OpenAiUsageClient {
    /// Creates a client for the production API.
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: API_BASE_URL.to_string(),
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, path: &str, start: DateTime<Utc>) -> Result<String, FetchError> {
        let base = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let mut url = Url::parse(&base)
            .map_err(|e| FetchError::InvalidResponse(format!("bad URL {base}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("start_time", &start.timestamp().to_string())
            .append_pair("bucket_width", "1d")
            .append_pair("limit", &PERIOD_DAYS.to_string());
        Ok(url.into())
    }

    /// Fetches token, request and cost totals for the trailing 30 days.
    ///
    /// Cost is best effort: if the cost endpoint fails for a reason other
    /// than authentication, the counters are returned without it.
    #[instrument(skip(self, api_key))]
    pub async fn fetch(&self, api_key: &str) -> Result<RawCounterPayload, FetchError> {
        let start = Utc::now() - Duration::days(i64::from(PERIOD_DAYS));

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| FetchError::Auth("API key contains invalid characters".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);

        let usage_url = self.endpoint("organization/usage/completions", start)?;
        debug!(url = %usage_url, "Fetching OpenAI usage");
        let usage: BucketPage<CompletionsResult> =
            self.http.get_json(&usage_url, headers.clone()).await?;

        let costs_url = self.endpoint("organization/costs", start)?;
        let costs = match self.http.get_json::<BucketPage<CostResult>>(&costs_url, headers).await {
            Ok(page) => Some(page),
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                debug!(error = %e, "OpenAI cost lookup failed, continuing without cost");
                None
            }
        };

        Ok(summarize(&usage, costs.as_ref(), PERIOD_DAYS))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const USAGE: &str = r#"{
        "object": "page",
        "data": [
            {"object": "bucket", "start_time": 1730419200, "end_time": 1730505600,
             "results": [{"object": "organization.usage.completions.result",
                          "input_tokens": 1000, "output_tokens": 250, "num_model_requests": 4}]},
            {"object": "bucket", "start_time": 1730505600, "end_time": 1730592000,
             "results": [{"input_tokens": 500, "output_tokens": 50, "num_model_requests": 2}]},
            {"object": "bucket", "start_time": 1730592000, "end_time": 1730678400, "results": []}
        ],
        "has_more": false
    }"#;

    const COSTS: &str = r#"{
        "data": [
            {"results": [{"amount": {"value": 0.25, "currency": "usd"}}]},
            {"results": [{"amount": {"value": 0.5, "currency": "usd"}}, {"amount": null}]}
        ]
    }"#;

    #[test]
    fn test_summarize_sums_buckets() {
        let usage: BucketPage<CompletionsResult> = serde_json::from_str(USAGE).unwrap();
        let costs: BucketPage<CostResult> = serde_json::from_str(COSTS).unwrap();

        let raw = summarize(&usage, Some(&costs), 30);
        assert_eq!(raw.input_tokens, Some(1500));
        assert_eq!(raw.output_tokens, Some(300));
        assert_eq!(raw.total_requests, Some(6));
        assert_eq!(raw.total_cost_usd, Some(0.75));
        assert_eq!(raw.period_days, Some(30));
    }

    #[test]
    fn test_summarize_without_costs() {
        let usage: BucketPage<CompletionsResult> = serde_json::from_str(r#"{"data": []}"#).unwrap();
        let raw = summarize(&usage, None, 30);
        assert_eq!(raw.input_tokens, Some(0));
        assert_eq!(raw.total_cost_usd, None);
    }

    #[test]
    fn test_endpoint_query() {
        let client =
            OpenAiUsageClient::new(HttpClient::new()).with_base_url("https://example.test/v1/");
        let start = DateTime::from_timestamp(1_730_000_000, 0).unwrap();
        let url = client.endpoint("organization/costs", start).unwrap();
        assert_eq!(
            url,
            "https://example.test/v1/organization/costs?start_time=1730000000&bucket_width=1d&limit=30"
        );
    }
}
