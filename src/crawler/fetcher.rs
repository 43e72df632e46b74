//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the identifying header set
//! - Waiting on the shared global rate limiter before every attempt
//! - Retry with bounded exponential backoff for transient failures
//! - Error classification

use crate::config::{Config, CrawlerConfig, UserAgentConfig};
use crate::{ConfigError, HarvestError};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Token bucket shared by every worker of a crawl
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Maximum number of redirect hops followed per request
const MAX_REDIRECTS: usize = 10;

/// Outcome class of a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// 2xx response with a text body
    Success,

    /// Failure worth retrying (429, 500, 502, 503, 504, timeouts,
    /// connection and interrupted body reads)
    TransientFailure,

    /// Failure that will not improve on retry, or a transient failure
    /// whose attempts are exhausted
    PermanentFailure,
}

/// Result of a fetch operation
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: FetchStatus,

    /// Page body (empty unless the fetch succeeded)
    pub body: String,

    /// Number of attempts made, including the successful one
    pub attempts: u32,

    /// HTTP status code of the last response, if any
    pub status_code: Option<u16>,

    /// URL after redirects (the requested URL when no response was received)
    pub final_url: Url,

    /// Content-Type header value of the last response
    pub content_type: Option<String>,

    /// Description of the last failure
    pub error: Option<String>,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    fn failure(url: &Url, status: FetchStatus, status_code: Option<u16>, error: String) -> Self {
        Self {
            status,
            body: String::new(),
            attempts: 0,
            status_code,
            final_url: url.clone(),
            content_type: None,
            error: Some(error),
        }
    }
}

/// Timeout and retry settings of a fetcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl FetchPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            timeout: config.fetch_timeout(),
            max_attempts: config.max_fetch_attempts.max(1),
            backoff_base: config.backoff_base(),
            backoff_max: config.backoff_max(),
        }
    }

    /// Delay after the given (1-based) failed attempt
    ///
    /// `backoff_base * 2^(attempt - 1)`, capped at `backoff_max`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.backoff_base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }
}

/// Builds the global rate limiter for the given start rate
///
/// Fails if the rate does not describe a positive period.
pub fn build_rate_limiter(requests_per_second: f64) -> Result<GlobalRateLimiter, HarvestError> {
    if !(requests_per_second.is_finite() && requests_per_second > 0.0) {
        return Err(HarvestError::RateLimit(requests_per_second));
    }

    let quota = Quota::with_period(Duration::from_secs_f64(1.0 / requests_per_second))
        .ok_or(HarvestError::RateLimit(requests_per_second))?;

    Ok(RateLimiter::direct(quota))
}

/// Builds an HTTP client with proper configuration
///
/// Every request carries the user agent
/// (`CrawlerName/Version (+ContactURL; ContactEmail)`) plus the configured
/// extra headers.
///
/// # Example
///
/// ```no_run
/// use ripple_harvest::config::UserAgentConfig;
/// use ripple_harvest::crawler::build_http_client;
/// use std::collections::BTreeMap;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "RippleHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, &BTreeMap::new(), Duration::from_secs(15)).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    headers: &BTreeMap<String, String>,
    timeout: Duration,
) -> Result<Client, HarvestError> {
    let mut default_headers = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::Validation(format!("Invalid header name '{}'", name)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| ConfigError::Validation(format!("Invalid value for header '{}'", name)))?;
        default_headers.insert(header_name, header_value);
    }

    let client = Client::builder()
        .user_agent(user_agent.header_value())
        .default_headers(default_headers)
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// Returns true for response codes that are retried
fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Classifies a request error
fn classify_error(error: &reqwest::Error) -> (FetchStatus, String) {
    if error.is_timeout() {
        (FetchStatus::TransientFailure, "Request timeout".to_string())
    } else if error.is_connect() {
        (
            FetchStatus::TransientFailure,
            format!("Connection error: {}", error),
        )
    } else if error.is_redirect() {
        (
            FetchStatus::PermanentFailure,
            format!("Redirect error: {}", error),
        )
    } else if error.is_decode() {
        (
            FetchStatus::PermanentFailure,
            format!("Malformed response body: {}", error),
        )
    } else if error.is_body() {
        (
            FetchStatus::TransientFailure,
            format!("Body read error: {}", error),
        )
    } else {
        (FetchStatus::PermanentFailure, error.to_string())
    }
}

/// Fetches URLs with rate limiting and retry
///
/// Cheap to clone; clones share the client and the rate limiter.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    limiter: Arc<GlobalRateLimiter>,
    policy: FetchPolicy,
}

impl Fetcher {
    pub fn new(client: Client, limiter: Arc<GlobalRateLimiter>, policy: FetchPolicy) -> Self {
        Self {
            client,
            limiter,
            policy,
        }
    }

    /// Builds the client, limiter and policy from a full configuration
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        let policy = FetchPolicy::from_config(&config.crawler);
        let client = build_http_client(&config.user_agent, &config.headers, policy.timeout)?;
        let limiter = build_rate_limiter(config.crawler.requests_per_second)?;
        Ok(Self::new(client, Arc::new(limiter), policy))
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx with text body | Success |
    /// | HTTP 429, 500, 502, 503, 504 | Retry with backoff |
    /// | Timeout, connection or interrupted body read | Retry with backoff |
    /// | Body fails to decode (gzip, brotli) | Immediate PermanentFailure |
    /// | Other status (404, 403, ...) | Immediate PermanentFailure |
    /// | Body is not valid UTF-8 | Immediate PermanentFailure |
    /// | Attempts exhausted | PermanentFailure |
    pub async fn fetch(&self, url: &Url) -> FetchResult {
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.limiter.until_ready().await;

            let mut result = self.fetch_once(url).await;
            result.attempts = attempt;

            if result.status != FetchStatus::TransientFailure {
                return result;
            }

            if attempt >= self.policy.max_attempts {
                result.status = FetchStatus::PermanentFailure;
                result.error = Some(format!(
                    "gave up after {} attempts: {}",
                    attempt,
                    result.error.unwrap_or_default()
                ));
                return result;
            }

            let delay = self.policy.backoff_delay(attempt);
            tracing::debug!(
                "Transient failure for {} (attempt {}/{}): {}; retrying in {:?}",
                url,
                attempt,
                self.policy.max_attempts,
                result.error.as_deref().unwrap_or("unknown"),
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Performs one GET request and classifies the outcome
    async fn fetch_once(&self, url: &Url) -> FetchResult {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                let (status, error) = classify_error(&e);
                return FetchResult::failure(url, status, None, error);
            }
        };

        let status = response.status();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            let class = if is_transient_status(status) {
                FetchStatus::TransientFailure
            } else {
                FetchStatus::PermanentFailure
            };
            let mut result =
                FetchResult::failure(url, class, Some(status.as_u16()), format!("HTTP {}", status));
            result.final_url = final_url;
            result.content_type = content_type;
            return result;
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                let (class, error) = classify_error(&e);
                let mut result =
                    FetchResult::failure(url, class, Some(status.as_u16()), error);
                result.final_url = final_url;
                return result;
            }
        };

        match String::from_utf8(bytes.to_vec()) {
            Ok(body) => FetchResult {
                status: FetchStatus::Success,
                body,
                attempts: 0,
                status_code: Some(status.as_u16()),
                final_url,
                content_type,
                error: None,
            },
            Err(_) => {
                let mut result = FetchResult::failure(
                    url,
                    FetchStatus::PermanentFailure,
                    Some(status.as_u16()),
                    "Response body is not valid UTF-8".to_string(),
                );
                result.final_url = final_url;
                result.content_type = content_type;
                result
            }
        }
    }
}
