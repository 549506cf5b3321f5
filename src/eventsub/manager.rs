//! Subscription lifecycle manager
//!
//! Owns the registry of subscription instances keyed by identity. Each
//! identity has its own async lock, held across the gateway call, so a
//! register racing an unsubscribe (or a second register) for the same identity
//! is serialised while other identities proceed concurrently.

use super::events::Event;
use super::kinds::SubscriptionDescriptor;
use super::negotiator::{Negotiator, TransportConfig};
use super::types::{
    DeliveryOutcome, RemoteSubscription, Revocation, SubscriptionInstance, SubscriptionState,
};
use crate::decode::extract_path;
use crate::error::{Error, Result};
use crate::http::{Gateway, GatewayRequest};
use crate::pagination::{CollectionTraversal, PageRequest};
use crate::types::{JsonValue, Method};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Helix endpoint for creating, listing and deleting subscriptions
pub const SUBSCRIPTIONS_PATH: &str = "eventsub/subscriptions";

/// Callback invoked with each decoded event
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

struct Entry {
    descriptor: SubscriptionDescriptor,
    handlers: Vec<EventHandler>,
    remote_id: Option<String>,
    remote_status: Option<String>,
    state: SubscriptionState,
    revocation_reason: Option<String>,
}

impl Entry {
    fn pending(descriptor: SubscriptionDescriptor, handler: EventHandler) -> Self {
        Self {
            descriptor,
            handlers: vec![handler],
            remote_id: None,
            remote_status: None,
            state: SubscriptionState::Pending,
            revocation_reason: None,
        }
    }

    fn activate(&mut self, remote: RemoteSubscription) {
        self.remote_id = Some(remote.id);
        self.remote_status = Some(remote.status);
        self.state = SubscriptionState::Active;
    }

    fn revoke(&mut self, reason: Option<String>) {
        self.state = SubscriptionState::Revoked;
        self.revocation_reason = reason;
        self.handlers.clear();
    }

    fn snapshot(&self) -> SubscriptionInstance {
        SubscriptionInstance {
            descriptor: self.descriptor.clone(),
            remote_id: self.remote_id.clone(),
            remote_status: self.remote_status.clone(),
            state: self.state,
            handlers: self.handlers.len(),
            revocation_reason: self.revocation_reason.clone(),
        }
    }
}

type Slot = Arc<Mutex<Option<Entry>>>;

/// Registers subscriptions and routes inbound events to their handlers
///
/// Construct one per client and share it by reference (or `Arc`).
pub struct SubscriptionManager {
    gateway: Arc<dyn Gateway>,
    negotiator: Negotiator,
    traversal: CollectionTraversal,
    registry: DashMap<String, Slot>,
    /// remote subscription id -> identity
    remote_index: DashMap<String, String>,
}

impl SubscriptionManager {
    pub fn new(gateway: Arc<dyn Gateway>, negotiator: Negotiator) -> Self {
        Self {
            traversal: CollectionTraversal::new(Arc::clone(&gateway)),
            gateway,
            negotiator,
            registry: DashMap::new(),
            remote_index: DashMap::new(),
        }
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    fn slot(&self, identity: &str) -> Slot {
        Arc::clone(self.registry.entry(identity.to_string()).or_default().value())
    }

    fn existing_slot(&self, identity: &str) -> Option<Slot> {
        self.registry.get(identity).map(|slot| Arc::clone(slot.value()))
    }

    /// Register `handler` for `descriptor`
    ///
    /// An active instance with the same identity gets the handler attached and
    /// no remote call is made. Otherwise the subscription is created remotely;
    /// a gateway failure leaves the instance `Failed` and is returned.
    pub async fn register(
        &self,
        descriptor: SubscriptionDescriptor,
        handler: EventHandler,
    ) -> Result<SubscriptionInstance> {
        let slot = self.slot(descriptor.identity());
        let mut guard = slot.lock().await;

        if let Some(entry) = guard.as_mut().filter(|e| e.state.is_active()) {
            entry.handlers.push(handler);
            debug!(
                identity = %entry.descriptor,
                handlers = entry.handlers.len(),
                "Attached handler to active subscription"
            );
            return Ok(entry.snapshot());
        }

        let negotiated = self.negotiator.negotiate(&descriptor);
        let request = GatewayRequest::new()
            .json(negotiated.body)
            .scope_opt(descriptor.scope());
        let entry = guard.insert(Entry::pending(descriptor, handler));

        let created = match self
            .gateway
            .call(Method::POST, SUBSCRIPTIONS_PATH, request)
            .await
        {
            Ok(body) => created_subscription(&body),
            Err(err) if err.is_conflict() => {
                self.adopt_existing(&entry.descriptor, &negotiated.transport, err)
                    .await
            }
            Err(err) => Err(err),
        };

        match created {
            Ok(remote) => {
                self.remote_index
                    .insert(remote.id.clone(), negotiated.identity.clone());
                info!(
                    identity = %negotiated.identity,
                    remote_id = %remote.id,
                    status = %remote.status,
                    transport = negotiated.transport.method(),
                    "Subscription active"
                );
                entry.activate(remote);
                Ok(entry.snapshot())
            }
            Err(err) => {
                entry.state = SubscriptionState::Failed;
                warn!(
                    identity = %negotiated.identity,
                    error = %err,
                    "Subscription registration failed"
                );
                Err(err)
            }
        }
    }

    /// Find a live remote subscription matching `descriptor` and delivering
    /// to `transport` after a 409
    async fn adopt_existing(
        &self,
        descriptor: &SubscriptionDescriptor,
        transport: &TransportConfig,
        conflict: Error,
    ) -> Result<RemoteSubscription> {
        let request =
            PageRequest::get(SUBSCRIPTIONS_PATH).query("type", descriptor.kind().type_name());
        let existing = self
            .traversal
            .fetch_all::<RemoteSubscription>(&request)
            .await?;

        existing
            .into_values()
            .into_iter()
            .filter(|remote| remote.is_live() && transport.matches_remote(&remote.transport))
            .find(|remote| {
                remote
                    .descriptor()
                    .is_ok_and(|d| d.identity() == descriptor.identity())
            })
            .inspect(|remote| {
                info!(
                    identity = %descriptor,
                    remote_id = %remote.id,
                    "Adopted existing remote subscription"
                );
            })
            .ok_or(conflict)
    }

    /// Route one raw payload to the handlers registered under `identity`
    ///
    /// Never fails: unknown or inactive identities are discarded and a payload
    /// that does not decode only affects this delivery.
    pub async fn deliver(&self, identity: &str, payload: &JsonValue) -> DeliveryOutcome {
        let Some(slot) = self.existing_slot(identity) else {
            debug!(identity, "Discarding event for unknown subscription");
            return DeliveryOutcome::Discarded;
        };
        let guard = slot.lock().await;

        let Some(entry) = guard.as_ref().filter(|e| e.state.is_active()) else {
            debug!(identity, "Discarding event for inactive subscription");
            return DeliveryOutcome::Discarded;
        };

        match entry.descriptor.transform(payload) {
            Ok(event) => {
                for handler in &entry.handlers {
                    handler(&event);
                }
                debug!(identity, handlers = entry.handlers.len(), "Event delivered");
                DeliveryOutcome::Delivered(entry.handlers.len())
            }
            Err(err) => {
                warn!(identity, error = %err, "Malformed event payload");
                DeliveryOutcome::Malformed(err.to_string())
            }
        }
    }

    /// Stop receiving events for `identity`
    ///
    /// The instance is marked `Revoked` even if the remote delete fails; the
    /// remote side is reconciled later through a revocation notice.
    pub async fn unsubscribe(&self, identity: &str) -> Revocation {
        let Some(slot) = self.existing_slot(identity) else {
            return Revocation::NotActive;
        };
        let mut guard = slot.lock().await;

        let Some(entry) = guard.as_mut().filter(|e| e.state.is_active()) else {
            debug!(identity, "Unsubscribe on inactive subscription ignored");
            return Revocation::NotActive;
        };

        let outcome = match entry.remote_id.as_deref() {
            Some(remote_id) => {
                let request = GatewayRequest::new().query("id", remote_id);
                match self
                    .gateway
                    .call(Method::DELETE, SUBSCRIPTIONS_PATH, request)
                    .await
                {
                    Ok(_) => Revocation::Confirmed,
                    Err(err) if err.is_not_found() => Revocation::Confirmed,
                    Err(err) => {
                        warn!(
                            identity,
                            remote_id,
                            error = %err,
                            "Remote revoke failed; marking revoked locally"
                        );
                        Revocation::Unconfirmed
                    }
                }
            }
            None => Revocation::Unconfirmed,
        };

        if let Some(remote_id) = &entry.remote_id {
            self.remote_index.remove(remote_id);
        }
        entry.revoke(None);
        info!(identity, ?outcome, "Subscription revoked");
        outcome
    }

    /// Apply a remote revocation notice; no gateway call is made
    ///
    /// Returns whether an active instance was revoked.
    pub async fn revoke_remote(&self, identity: &str, reason: impl Into<String>) -> bool {
        let Some(slot) = self.existing_slot(identity) else {
            return false;
        };
        let mut guard = slot.lock().await;

        match guard.as_mut().filter(|e| e.state.is_active()) {
            Some(entry) => {
                let reason = reason.into();
                if let Some(remote_id) = &entry.remote_id {
                    self.remote_index.remove(remote_id);
                }
                info!(identity, reason = %reason, "Subscription revoked remotely");
                entry.revoke(Some(reason));
                true
            }
            None => false,
        }
    }

    /// Resolve the identity an inbound notification belongs to
    ///
    /// Looks up the remote subscription id first and falls back to deriving
    /// the identity from the payload's type and condition.
    pub fn identity_for_payload(&self, payload: &JsonValue) -> Option<String> {
        let subscription = payload.get("subscription")?;

        if let Some(remote_id) = subscription.get("id").and_then(JsonValue::as_str) {
            if let Some(identity) = self.remote_index.get(remote_id) {
                return Some(identity.value().clone());
            }
        }

        let type_name = subscription.get("type")?.as_str()?;
        let version = subscription
            .get("version")
            .and_then(JsonValue::as_str)
            .unwrap_or("1");
        let condition = subscription.get("condition")?;

        SubscriptionDescriptor::from_remote(type_name, version, condition)
            .map(|d| d.identity().to_string())
            .ok()
    }

    /// Snapshot of the instance registered under `identity`
    pub async fn instance(&self, identity: &str) -> Option<SubscriptionInstance> {
        let slot = self.existing_slot(identity)?;
        let guard = slot.lock().await;
        guard.as_ref().map(Entry::snapshot)
    }

    /// Identities of all active instances, sorted
    pub async fn active_identities(&self) -> Vec<String> {
        let slots: Vec<(String, Slot)> = self
            .registry
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();

        let mut active = Vec::new();
        for (identity, slot) in slots {
            if slot
                .lock()
                .await
                .as_ref()
                .is_some_and(|e| e.state.is_active())
            {
                active.push(identity);
            }
        }
        active.sort();
        active
    }

    /// Unsubscribe every active instance
    pub async fn unsubscribe_all(&self) -> Vec<(String, Revocation)> {
        let mut results = Vec::new();
        for identity in self.active_identities().await {
            let outcome = self.unsubscribe(&identity).await;
            results.push((identity, outcome));
        }
        results
    }
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("negotiator", &self.negotiator)
            .field("identities", &self.registry.len())
            .finish_non_exhaustive()
    }
}

/// Remote subscription from a create response (`data[0]`)
fn created_subscription(body: &JsonValue) -> Result<RemoteSubscription> {
    let created = extract_path(body, "data.0")
        .ok_or_else(|| Error::decode("registration response has no subscription"))?;
    RemoteSubscription::deserialize(created).map_err(|e| Error::decode(e.to_string()))
}
