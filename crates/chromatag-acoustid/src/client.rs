// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{Result, WebServiceError};
use crate::models::{
    parse_lookup_result, ApiResponse, ErrorEnvelope, LookupResponse, Meta, RecordingMatch,
    Submission, SubmissionStatus, SubmissionsResponse,
};
use crate::rate_limiter::RateLimiter;
use chromatag_fingerprint::Fingerprint;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

const ACOUSTID_API_BASE: &str = "https://api.acoustid.org/v2";
const USER_AGENT: &str = concat!(
    "chromatag/",
    env!("CARGO_PKG_VERSION"),
    " ( https://github.com/chromatag/chromatag )"
);

/// AcoustID API client with rate limiting.
///
/// Cloning is cheap; clones share the HTTP connection pool and the rate
/// limiter.
#[derive(Debug, Clone)]
pub struct AcoustidClient {
    client: Client,
    base_url: String,
    api_key: String,
    rate_limiter: RateLimiter,
}

impl AcoustidClient {
    /// Create a new AcoustID client.
    ///
    /// # Arguments
    /// * `api_key` - AcoustID application API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    /// Create a client builder for custom configuration.
    pub fn builder(api_key: impl Into<String>) -> AcoustidClientBuilder {
        AcoustidClientBuilder::new(api_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// URL of the lookup endpoint.
    pub fn lookup_url(&self) -> String {
        format!("{}/lookup", self.base_url)
    }

    /// Look up a fingerprint and return the full response.
    ///
    /// # Arguments
    /// * `fingerprint` - The Chromaprint fingerprint and its duration.
    /// * `meta` - Metadata sections to include; empty means recordings only.
    ///
    /// # Example
    /// ```no_run
    /// # use chromatag_acoustid::{AcoustidClient, Meta};
    /// # use chromatag_fingerprint::Fingerprint;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = AcoustidClient::new("your-api-key")?;
    /// let fp = Fingerprint::new("AQADtNIyRUkkZUqS", 215.0);
    /// let response = client.lookup(&fp, &[Meta::Recordings, Meta::ReleaseGroups]).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn lookup(&self, fingerprint: &Fingerprint, meta: &[Meta]) -> Result<LookupResponse> {
        fingerprint
            .validate()
            .map_err(|e| WebServiceError::InvalidRequest(e.to_string()))?;

        let meta = if meta.is_empty() {
            Meta::Recordings.as_str().to_string()
        } else {
            Meta::join(meta)
        };

        let params = vec![
            ("format".to_string(), "json".to_string()),
            ("client".to_string(), self.api_key.clone()),
            ("duration".to_string(), fingerprint.duration_secs().to_string()),
            ("fingerprint".to_string(), fingerprint.hash.clone()),
            ("meta".to_string(), meta),
        ];

        self.post("lookup", params).await
    }

    /// Look up a fingerprint and return its recording matches in server order.
    pub async fn lookup_matches(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<impl Iterator<Item = RecordingMatch>> {
        let response = self.lookup(fingerprint, &[Meta::Recordings]).await?;
        parse_lookup_result(response)
    }

    /// Submit fingerprints with optional metadata.
    ///
    /// # Arguments
    /// * `user_key` - The submitting user's AcoustID API key.
    /// * `submissions` - One or more fingerprints.
    ///
    /// Returns one status per submission, in the order given.
    pub async fn submit(
        &self,
        user_key: &str,
        submissions: &[Submission],
    ) -> Result<Vec<SubmissionStatus>> {
        if submissions.is_empty() {
            return Err(WebServiceError::InvalidRequest(
                "at least one submission is required".to_string(),
            ));
        }

        if let Some(index) = submissions
            .iter()
            .position(|s| s.fingerprint.is_empty() || s.duration == 0)
        {
            return Err(WebServiceError::InvalidRequest(format!(
                "submission {} is missing a fingerprint or duration",
                index
            )));
        }

        let mut params = vec![
            ("format".to_string(), "json".to_string()),
            ("client".to_string(), self.api_key.clone()),
            ("user".to_string(), user_key.to_string()),
        ];
        for (index, submission) in submissions.iter().enumerate() {
            params.extend(submission.form_fields(index));
        }

        let response: SubmissionsResponse = self.post("submit", params).await?;
        Ok(response.submissions)
    }

    /// Check the status of an earlier submission.
    pub async fn submission_status(&self, submission_id: u64) -> Result<SubmissionStatus> {
        let params = vec![
            ("format".to_string(), "json".to_string()),
            ("client".to_string(), self.api_key.clone()),
            ("id".to_string(), submission_id.to_string()),
        ];

        let response: SubmissionsResponse = self.post("submission_status", params).await?;
        response
            .submissions
            .into_iter()
            .find(|s| s.id == submission_id)
            .ok_or_else(|| {
                WebServiceError::InvalidResponse(format!(
                    "submission {} not included in response",
                    submission_id
                ))
            })
    }

    /// Internal method to perform rate-limited, gzip-compressed POST requests.
    async fn post<T>(&self, endpoint: &str, params: Vec<(String, String)>) -> Result<T>
    where
        T: DeserializeOwned + ApiResponse,
    {
        let url = format!("{}/{}", self.base_url, endpoint);

        trace!(target: "acoustid", "POST {} {}", url, redacted_form(&params));
        let form = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        let body = compress(form.as_bytes())?;

        self.rate_limiter.acquire().await;

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(CONTENT_ENCODING, "gzip")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        debug!(target: "acoustid", "response status: {}", status);

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error)
                .map(|error| error.message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(WebServiceError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        trace!(target: "acoustid", "response body: {}", body);

        let parsed: T = serde_json::from_str(&body).map_err(|e| {
            WebServiceError::InvalidResponse(format!("response is not valid JSON: {}", e))
        })?;
        parsed.check_status()?;
        Ok(parsed)
    }
}

/// Form body for logging, with the API keys masked.
fn redacted_form(params: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|(key, value)| {
            let value = if matches!(key.as_str(), "client" | "user") {
                "***"
            } else {
                value.as_str()
            };
            (key.as_str(), value)
        }))
        .finish()
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Builder for AcoustID client.
#[derive(Debug)]
pub struct AcoustidClientBuilder {
    api_key: String,
    base_url: String,
    timeout: Duration,
    rate_limiter: Option<RateLimiter>,
    max_requests: usize,
    window: Duration,
}

impl AcoustidClientBuilder {
    /// Create a new builder.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: ACOUSTID_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
            rate_limiter: None,
            max_requests: 3,
            window: Duration::from_secs(1),
        }
    }

    /// Set a custom base URL (useful for testing or a mirror).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Allow at most `max_requests` per rolling `window`.
    pub fn rate_limit(mut self, max_requests: usize, window: Duration) -> Self {
        self.max_requests = max_requests;
        self.window = window;
        self
    }

    /// Share an existing limiter instead of creating one.
    pub fn rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Build the AcoustID client.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The base URL is not a valid URL format
    /// - The HTTP client cannot be created
    pub fn build(self) -> Result<AcoustidClient> {
        let base_url = self.base_url.trim_end_matches('/').to_string();

        Url::parse(&base_url)
            .map_err(|e| WebServiceError::InvalidRequest(format!("Invalid base URL: {}", e)))?;

        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()?;

        let rate_limiter = self
            .rate_limiter
            .unwrap_or_else(|| RateLimiter::new(self.max_requests, self.window));

        Ok(AcoustidClient {
            client,
            base_url,
            api_key: self.api_key,
            rate_limiter,
        })
    }
}
