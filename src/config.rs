//! Client configuration
//!
//! YAML configuration for a Helix client: credentials, HTTP behaviour,
//! pagination defaults and (optionally) EventSub transport and subscriptions.
//! Credentials and the webhook secret can be overridden from the environment.

use crate::error::{Error, Result};
use crate::eventsub::{ReceiverConfig, SubscriptionDescriptor, SubscriptionKind, TransportConfig};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::types::{BackoffType, OptionStringExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const ENV_CLIENT_ID: &str = "HELIX_CLIENT_ID";
pub const ENV_ACCESS_TOKEN: &str = "HELIX_ACCESS_TOKEN";
pub const ENV_BASE_URL: &str = "HELIX_BASE_URL";
pub const ENV_WEBHOOK_SECRET: &str = "HELIX_WEBHOOK_SECRET";

/// Largest `first` value Helix accepts
const MAX_PAGE_SIZE: u32 = 100;

// ============================================================================
// Top-Level Client Config
// ============================================================================

/// Complete client configuration loaded from YAML
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL for API requests
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Application client id
    #[serde(default)]
    pub client_id: String,

    /// OAuth access token
    #[serde(default)]
    pub access_token: String,

    /// Scopes granted to the access token; unset disables scope checks
    #[serde(default)]
    pub scopes: Option<Vec<String>>,

    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Pagination defaults
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// EventSub transport and subscriptions
    #[serde(default)]
    pub eventsub: Option<EventSubConfig>,
}

fn default_base_url() -> String {
    "https://api.twitch.tv/helix".to_string()
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("access_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("http", &self.http)
            .field("pagination", &self.pagination)
            .field("eventsub", &self.eventsub)
            .finish()
    }
}

impl ClientConfig {
    /// Parse a YAML document without validating it
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse client config YAML: {e}")))
    }

    /// Apply `HELIX_*` overrides using `lookup` to read variables
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(client_id) = lookup(ENV_CLIENT_ID).none_if_empty() {
            self.client_id = client_id;
        }
        if let Some(token) = lookup(ENV_ACCESS_TOKEN).none_if_empty() {
            self.access_token = token;
        }
        if let Some(base_url) = lookup(ENV_BASE_URL).none_if_empty() {
            self.base_url = base_url;
        }
        if let Some(value) = lookup(ENV_WEBHOOK_SECRET).none_if_empty() {
            if let Some(TransportConfig::Webhook { secret, .. }) =
                self.eventsub.as_mut().map(|e| &mut e.transport)
            {
                *secret = value;
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::missing_field("client_id"));
        }
        if self.access_token.trim().is_empty() {
            return Err(Error::missing_field("access_token"));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| Error::invalid_value("base_url", e.to_string()))?;

        if let Some(size) = self.pagination.page_size {
            if size == 0 || size > MAX_PAGE_SIZE {
                return Err(Error::invalid_value(
                    "pagination.page_size",
                    format!("must be between 1 and {MAX_PAGE_SIZE}"),
                ));
            }
        }

        if let Some(eventsub) = &self.eventsub {
            eventsub.validate()?;
        }

        Ok(())
    }

    /// HTTP client settings derived from this config
    pub fn http_client_config(&self) -> HttpClientConfig {
        let http = &self.http;
        let builder = HttpClientConfig::builder()
            .base_url(&self.base_url)
            .credentials(&self.client_id, &self.access_token)
            .timeout(Duration::from_millis(http.timeout_ms))
            .max_retries(http.max_retries)
            .backoff(
                http.backoff,
                Duration::from_millis(http.initial_backoff_ms),
                Duration::from_millis(http.max_backoff_ms),
            );

        let builder = match &self.scopes {
            Some(scopes) => builder.scopes(scopes.iter().cloned()),
            None => builder,
        };

        let builder = match &http.rate_limit {
            Some(limit) => builder.rate_limit(limit.clone()),
            None => builder.no_rate_limit(),
        };
        builder.build()
    }
}

// ============================================================================
// HTTP Config
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of retries
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff curve between retries
    #[serde(default)]
    pub backoff: BackoffType,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Rate limiting; `null` disables it
    #[serde(default = "default_rate_limit")]
    pub rate_limit: Option<RateLimiterConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            backoff: BackoffType::default(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            rate_limit: default_rate_limit(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_rate_limit() -> Option<RateLimiterConfig> {
    Some(RateLimiterConfig::default())
}

// ============================================================================
// Pagination Config
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Value sent as `first` on paginated requests
    #[serde(default)]
    pub page_size: Option<u32>,
}

// ============================================================================
// EventSub Config
// ============================================================================

/// EventSub transport, receiver and subscriptions to register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSubConfig {
    pub transport: TransportConfig,

    /// Webhook receiver settings (webhook transport only)
    #[serde(default)]
    pub webhook: ReceiverConfig,

    #[serde(default)]
    pub subscriptions: Vec<SubscriptionEntry>,
}

impl EventSubConfig {
    fn validate(&self) -> Result<()> {
        self.transport.validate()?;

        if !self.webhook.path.starts_with('/') {
            return Err(Error::invalid_value(
                "eventsub.webhook.path",
                "must start with '/'",
            ));
        }

        for (index, entry) in self.subscriptions.iter().enumerate() {
            entry.descriptor().map_err(|e| {
                Error::invalid_value(format!("eventsub.subscriptions[{index}]"), e.to_string())
            })?;
        }
        Ok(())
    }

    /// Descriptors for every configured subscription
    pub fn descriptors(&self) -> Result<Vec<SubscriptionDescriptor>> {
        self.subscriptions
            .iter()
            .map(SubscriptionEntry::descriptor)
            .collect()
    }
}

/// One subscription to register at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionEntry {
    pub kind: SubscriptionKind,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl SubscriptionEntry {
    pub fn descriptor(&self) -> Result<SubscriptionDescriptor> {
        SubscriptionDescriptor::new(self.kind, self.params.clone())
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Load, apply environment overrides and validate a config file
pub fn load_config(path: impl AsRef<Path>) -> Result<ClientConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound {
                path: path.display().to_string(),
            }
        } else {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        }
    })?;

    let mut config = ClientConfig::from_yaml(&content)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Parse and validate a config from a YAML string, without env overrides
pub fn load_config_from_str(yaml: &str) -> Result<ClientConfig> {
    let config = ClientConfig::from_yaml(yaml)?;
    config.validate()?;
    Ok(config)
}
