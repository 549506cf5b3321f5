//! HTTP client with retry and rate limiting
//!
//! The reqwest-backed [`Gateway`] implementation. Handles:
//! - Client-Id / bearer token headers
//! - Scope checks against the token's granted scopes
//! - Automatic retries with configurable backoff
//! - Rate limiting against the Helix points bucket
//! - Helix error bodies mapped onto [`Error::Gateway`]

use super::gateway::{Gateway, GatewayRequest};
use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::error::{Error, Result};
use crate::types::{BackoffType, JsonValue, Method};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the HTTP client
#[derive(Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests
    pub base_url: Option<String>,
    /// Application client id, sent as `Client-Id`
    pub client_id: Option<String>,
    /// Access token, sent as `Authorization: Bearer`
    pub access_token: Option<String>,
    /// Scopes granted to the access token; `None` skips scope checks
    pub scopes: Option<HashSet<String>>,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            client_id: None,
            access_token: None,
            scopes: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            rate_limit: Some(RateLimiterConfig::default()),
            default_headers: HashMap::new(),
            user_agent: format!("helix-cdk/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl fmt::Debug for HttpClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("scopes", &self.scopes)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("backoff_type", &self.backoff_type)
            .field("rate_limit", &self.rate_limit)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the client id and access token
    pub fn credentials(mut self, client_id: impl Into<String>, token: impl Into<String>) -> Self {
        self.config.client_id = Some(client_id.into());
        self.config.access_token = Some(token.into());
        self
    }

    /// Set the scopes granted to the access token
    pub fn scopes<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.config.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// HTTP client with retry and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Fail with [`Error::MissingScope`] if the token lacks `scope`
    pub fn ensure_scope(&self, scope: &str) -> Result<()> {
        match &self.config.scopes {
            Some(granted) if !granted.contains(scope) => Err(Error::MissingScope {
                scope: scope.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Send a request, retrying transient failures
    ///
    /// 429s wait out `Retry-After`; 5xx, timeouts and connect errors use the
    /// configured backoff. The last failure is returned once retries run out.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        request: &GatewayRequest,
    ) -> Result<Response> {
        let full_url = self.build_url(path);
        let max_retries = request.max_retries.unwrap_or(self.config.max_retries);
        let timeout = request.timeout.unwrap_or(self.config.timeout);

        let mut attempt = 0;
        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.acquire().await;
            }

            let failure = match self.prepare(method, &full_url, request, timeout).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(%method, url = %full_url, attempt, "Request succeeded");
                    return Ok(response);
                }
                Ok(response) => failure_from_response(response).await,
                Err(e) if e.is_timeout() => Error::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                },
                Err(e) => Error::Http(e),
            };

            let delay = match &failure {
                Error::RateLimited {
                    retry_after_seconds,
                } => Some(Duration::from_secs(*retry_after_seconds)),
                Error::Http(e) if !e.is_connect() => None,
                other if other.is_retryable() => Some(self.calculate_backoff(attempt)),
                _ => None,
            };

            match delay {
                Some(delay) if attempt < max_retries => {
                    warn!(
                        %method,
                        url = %full_url,
                        attempt = attempt + 1,
                        max_attempts = max_retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "Retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                _ => return Err(failure),
            }
        }
    }

    /// Build one attempt of `request` with credentials and defaults applied
    fn prepare(
        &self,
        method: Method,
        url: &str,
        request: &GatewayRequest,
        timeout: Duration,
    ) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method.into(), url).timeout(timeout);

        if let Some(ref client_id) = self.config.client_id {
            req = req.header("Client-Id", client_id);
        }
        if let Some(ref token) = self.config.access_token {
            req = req.bearer_auth(token);
        }
        for (key, value) in self.config.default_headers.iter().chain(&request.headers) {
            req = req.header(key.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(ref body) = request.body {
            req = req.json(body);
        }
        req
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }

    /// Calculate backoff delay for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let initial = self.config.initial_backoff;
        let delay = match self.config.backoff_type {
            BackoffType::Constant => Some(initial),
            BackoffType::Linear => initial.checked_mul(attempt.saturating_add(1)),
            BackoffType::Exponential => initial.checked_mul(2u32.saturating_pow(attempt)),
        };

        delay
            .unwrap_or(self.config.max_backoff)
            .min(self.config.max_backoff)
    }
}

#[async_trait]
impl Gateway for HttpClient {
    async fn call(
        &self,
        method: Method,
        path: &str,
        request: GatewayRequest,
    ) -> Result<JsonValue> {
        if let Some(ref scope) = request.scope {
            self.ensure_scope(scope)?;
        }

        let response = self.send(method, path, &request).await?;
        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonValue::Null);
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| Error::decode(format!("Failed to parse JSON body from {path}: {e}")))
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Map a non-2xx response onto an error
async fn failure_from_response(response: Response) -> Error {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Error::RateLimited {
            retry_after_seconds: extract_retry_after(&response),
        };
    }
    let body = response.text().await.unwrap_or_default();
    Error::gateway(status.as_u16(), helix_error_message(&body))
}

/// Seconds to wait after a 429
///
/// Prefers `Retry-After`, then the Helix `Ratelimit-Reset` epoch.
fn extract_retry_after(response: &Response) -> u64 {
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<i64>().ok())
    };

    if let Some(seconds) = header("retry-after") {
        return seconds.max(0) as u64;
    }
    if let Some(reset_at) = header("ratelimit-reset") {
        let now = chrono::Utc::now().timestamp();
        return (reset_at - now).max(0) as u64;
    }
    60
}

/// Pull the human-readable message out of a Helix error body
///
/// Helix errors look like `{"error": "Not Found", "status": 404, "message": "..."}`.
pub(crate) fn helix_error_message(body: &str) -> String {
    serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(JsonValue::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
