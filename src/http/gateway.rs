//! The API gateway contract
//!
//! Everything above the transport talks to the remote service through
//! [`Gateway::call`]: one authenticated request, a typed JSON body back, or a
//! status-coded [`Error::Gateway`](crate::Error::Gateway).

use crate::error::Result;
use crate::types::{JsonValue, Method, QueryPairs, StringMap};
use async_trait::async_trait;
use std::time::Duration;

/// One request issued through a [`Gateway`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayRequest {
    /// Query parameters, in order; keys may repeat
    pub query: QueryPairs,
    /// Permission scope the request requires
    pub scope: Option<String>,
    /// Request body (JSON)
    pub body: Option<JsonValue>,
    /// Request headers
    pub headers: StringMap,
    /// Override timeout for this request
    pub timeout: Option<Duration>,
    /// Override max retries for this request
    pub max_retries: Option<u32>,
}

impl GatewayRequest {
    /// Create an empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a query parameter when a value is present
    #[must_use]
    pub fn query_opt(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Append several query parameters
    #[must_use]
    pub fn queries<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Require a permission scope
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Require a permission scope when one is given
    #[must_use]
    pub fn scope_opt(mut self, scope: Option<&str>) -> Self {
        self.scope = scope.map(str::to_string);
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set max retries
    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// First value for a query key
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Authenticated request execution against the remote API
///
/// Implementations own authentication, transport, timeouts and any retry
/// policy. Callers only see the decoded JSON body or an error; a timeout is an
/// ordinary error like any other.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Perform one request against `path` (relative to the API base)
    async fn call(&self, method: Method, path: &str, request: GatewayRequest)
        -> Result<JsonValue>;
}
