//! Subscription lifecycle types

use super::kinds::SubscriptionDescriptor;
use crate::error::Result;
use crate::types::JsonValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one subscription instance
///
/// `Pending -> Active | Failed`, `Active -> Revoked`. `Revoked` and `Failed`
/// are terminal; registering again creates a new instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Pending,
    Active,
    Revoked,
    Failed,
}

impl SubscriptionState {
    pub fn is_active(self) -> bool {
        self == SubscriptionState::Active
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscriptionState::Pending => "pending",
            SubscriptionState::Active => "active",
            SubscriptionState::Revoked => "revoked",
            SubscriptionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Snapshot of a registered subscription
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionInstance {
    pub descriptor: SubscriptionDescriptor,
    pub remote_id: Option<String>,
    /// Status string the remote service last reported
    pub remote_status: Option<String>,
    pub state: SubscriptionState,
    /// Handlers attached to this identity
    pub handlers: usize,
    pub revocation_reason: Option<String>,
}

impl SubscriptionInstance {
    pub fn identity(&self) -> &str {
        self.descriptor.identity()
    }
}

/// A subscription as listed by the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSubscription {
    pub id: String,
    pub status: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub version: String,
    #[serde(default)]
    pub condition: JsonValue,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cost: u64,
    #[serde(default)]
    pub transport: JsonValue,
}

impl RemoteSubscription {
    /// Enabled, or waiting on the webhook challenge
    pub fn is_live(&self) -> bool {
        matches!(
            self.status.as_str(),
            "enabled" | "webhook_callback_verification_pending"
        )
    }

    /// Rebuild the local descriptor this subscription corresponds to
    pub fn descriptor(&self) -> Result<SubscriptionDescriptor> {
        SubscriptionDescriptor::from_remote(&self.type_name, &self.version, &self.condition)
    }
}

/// Result of an unsubscribe
///
/// Local state is `Revoked` for both `Confirmed` and `Unconfirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revocation {
    /// The remote service acknowledged the revoke
    Confirmed,
    /// The revoke call failed; the remote side is reconciled later
    Unconfirmed,
    /// Nothing active under that identity
    NotActive,
}

/// What happened to one inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Transformed and passed to this many handlers
    Delivered(usize),
    /// No active instance for the identity
    Discarded,
    /// The payload did not decode for the subscription's kind
    Malformed(String),
}
