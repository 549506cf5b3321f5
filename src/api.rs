//! Helix client bundle
//!
//! One gateway, one traversal engine and (when a transport is configured) one
//! subscription manager per client, plus the few single-entity lookups that
//! need not-found translation.

use crate::config::ClientConfig;
use crate::decode::extract_path;
use crate::error::{Error, NotFoundExt, Result};
use crate::eventsub::{
    Negotiator, RemoteSubscription, SubscriptionManager, TransportConfig, SUBSCRIPTIONS_PATH,
};
use crate::http::{Gateway, GatewayRequest, HttpClient};
use crate::pagination::{Collection, CollectionTraversal, PageRequest};
use crate::types::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const USER_SUBSCRIPTION_PATH: &str = "subscriptions/user";
const USER_SUBSCRIPTION_SCOPE: &str = "user:read:subscriptions";

/// A user's subscription to one broadcaster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSubscription {
    pub broadcaster_id: String,
    pub broadcaster_login: String,
    pub broadcaster_name: String,
    pub is_gift: bool,
    pub tier: String,
    #[serde(default)]
    pub gifter_id: Option<String>,
    #[serde(default)]
    pub gifter_login: Option<String>,
    #[serde(default)]
    pub gifter_name: Option<String>,
}

/// Filters for listing EventSub subscriptions; Helix accepts at most one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub status: Option<String>,
    pub type_name: Option<String>,
    pub user_id: Option<String>,
}

impl SubscriptionFilter {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }

    pub fn type_name(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::default()
        }
    }
}

/// Entry point for Helix collections and EventSub
pub struct HelixClient {
    gateway: Arc<dyn Gateway>,
    traversal: CollectionTraversal,
    subscriptions: Option<Arc<SubscriptionManager>>,
    page_size: Option<u32>,
}

impl HelixClient {
    /// Build a reqwest-backed client from configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let http = HttpClient::with_config(config.http_client_config())?;
        let mut client = Self::with_gateway(Arc::new(http));
        client.page_size = config.pagination.page_size;
        if let Some(eventsub) = &config.eventsub {
            client = client.with_transport(eventsub.transport.clone());
        }
        Ok(client)
    }

    /// Build a client over any gateway
    pub fn with_gateway(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            traversal: CollectionTraversal::new(Arc::clone(&gateway)),
            gateway,
            subscriptions: None,
            page_size: None,
        }
    }

    /// Enable EventSub with `transport`
    #[must_use]
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.subscriptions = Some(Arc::new(SubscriptionManager::new(
            Arc::clone(&self.gateway),
            Negotiator::new(transport),
        )));
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn traversal(&self) -> &CollectionTraversal {
        &self.traversal
    }

    /// The subscription manager; errors if no transport is configured
    pub fn subscriptions(&self) -> Result<&Arc<SubscriptionManager>> {
        self.subscriptions
            .as_ref()
            .ok_or_else(|| Error::config("EventSub transport is not configured"))
    }

    /// A GET page request for `path` using the client's page size
    pub fn page_request(&self, path: impl Into<String>) -> PageRequest {
        let request = PageRequest::get(path);
        match self.page_size {
            Some(size) => request.page_size(size),
            None => request,
        }
    }

    /// Fetch every item of a paginated collection
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        request: &PageRequest,
    ) -> Result<Collection<T>> {
        self.traversal.fetch_all(request).await
    }

    /// Whether `user_id` subscribes to `broadcaster_id`
    ///
    /// Helix answers 404 when there is no subscription; that is `Ok(None)`.
    pub async fn check_user_subscription(
        &self,
        broadcaster_id: &str,
        user_id: &str,
    ) -> Result<Option<UserSubscription>> {
        let request = GatewayRequest::new()
            .query("broadcaster_id", broadcaster_id)
            .query("user_id", user_id)
            .scope(USER_SUBSCRIPTION_SCOPE);

        let Some(body) = self
            .gateway
            .call(Method::GET, USER_SUBSCRIPTION_PATH, request)
            .await
            .not_found_as_none()?
        else {
            debug!(broadcaster_id, user_id, "No user subscription");
            return Ok(None);
        };

        extract_path(&body, "data.0")
            .map(|item| {
                UserSubscription::deserialize(item).map_err(|e| Error::decode(e.to_string()))
            })
            .transpose()
    }

    /// List EventSub subscriptions; the collection carries the server total
    pub async fn eventsub_subscriptions(
        &self,
        filter: &SubscriptionFilter,
    ) -> Result<Collection<RemoteSubscription>> {
        let request = PageRequest::get(SUBSCRIPTIONS_PATH)
            .query_opt("status", filter.status.as_deref())
            .query_opt("type", filter.type_name.as_deref())
            .query_opt("user_id", filter.user_id.as_deref());
        self.traversal.fetch_all(&request).await
    }
}

impl std::fmt::Debug for HelixClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelixClient")
            .field("page_size", &self.page_size)
            .field("eventsub", &self.subscriptions.is_some())
            .finish_non_exhaustive()
    }
}
