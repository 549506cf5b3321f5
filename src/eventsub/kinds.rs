//! Subscription kinds and descriptors
//!
//! Every kind is described by a static [`KindSpec`]: its remote type name and
//! version, the scope needed to create it, the condition keys it accepts and
//! the transform that turns a raw payload into an [`Event`].

use super::events::{event_body, Event};
use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Turns a raw notification payload into a typed event
pub type TransformFn = fn(&JsonValue) -> Result<Event>;

/// Static capabilities of one subscription kind
pub struct KindSpec {
    pub type_name: &'static str,
    pub version: &'static str,
    pub scope: Option<&'static str>,
    /// Condition keys that must be present, in identity order
    pub required: &'static [&'static str],
    /// Optional qualifiers, in identity order
    pub optional: &'static [&'static str],
    /// At least one optional qualifier must be given
    pub needs_qualifier: bool,
    pub transform: TransformFn,
}

impl fmt::Debug for KindSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindSpec")
            .field("type_name", &self.type_name)
            .field("version", &self.version)
            .field("scope", &self.scope)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .finish_non_exhaustive()
    }
}

const BROADCASTER: &[&str] = &["broadcaster_user_id"];

static CHANNEL_UPDATE: KindSpec = KindSpec {
    type_name: "channel.update",
    version: "2",
    scope: None,
    required: BROADCASTER,
    optional: &[],
    needs_qualifier: false,
    transform: |p| event_body(p).map(Event::ChannelUpdate),
};

static CHANNEL_FOLLOW: KindSpec = KindSpec {
    type_name: "channel.follow",
    version: "2",
    scope: Some("moderator:read:followers"),
    required: &["broadcaster_user_id", "moderator_user_id"],
    optional: &[],
    needs_qualifier: false,
    transform: |p| event_body(p).map(Event::ChannelFollow),
};

static CHANNEL_SUBSCRIBE: KindSpec = KindSpec {
    type_name: "channel.subscribe",
    version: "1",
    scope: Some("channel:read:subscriptions"),
    required: BROADCASTER,
    optional: &[],
    needs_qualifier: false,
    transform: |p| event_body(p).map(Event::ChannelSubscribe),
};

static CHANNEL_CHEER: KindSpec = KindSpec {
    type_name: "channel.cheer",
    version: "1",
    scope: Some("bits:read"),
    required: BROADCASTER,
    optional: &[],
    needs_qualifier: false,
    transform: |p| event_body(p).map(Event::ChannelCheer),
};

static CHANNEL_RAID: KindSpec = KindSpec {
    type_name: "channel.raid",
    version: "1",
    scope: None,
    required: &[],
    optional: &["from_broadcaster_user_id", "to_broadcaster_user_id"],
    needs_qualifier: true,
    transform: |p| event_body(p).map(Event::ChannelRaid),
};

static REDEMPTION_ADD: KindSpec = KindSpec {
    type_name: "channel.channel_points_custom_reward_redemption.add",
    version: "1",
    scope: Some("channel:read:redemptions"),
    required: BROADCASTER,
    optional: &["reward_id"],
    needs_qualifier: false,
    transform: |p| event_body(p).map(Event::RedemptionAdd),
};

static REDEMPTION_UPDATE: KindSpec = KindSpec {
    type_name: "channel.channel_points_custom_reward_redemption.update",
    version: "1",
    scope: Some("channel:read:redemptions"),
    required: BROADCASTER,
    optional: &["reward_id"],
    needs_qualifier: false,
    transform: |p| event_body(p).map(Event::RedemptionUpdate),
};

static STREAM_ONLINE: KindSpec = KindSpec {
    type_name: "stream.online",
    version: "1",
    scope: None,
    required: BROADCASTER,
    optional: &[],
    needs_qualifier: false,
    transform: |p| event_body(p).map(Event::StreamOnline),
};

static STREAM_OFFLINE: KindSpec = KindSpec {
    type_name: "stream.offline",
    version: "1",
    scope: None,
    required: BROADCASTER,
    optional: &[],
    needs_qualifier: false,
    transform: |p| event_body(p).map(Event::StreamOffline),
};

/// Supported subscription kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionKind {
    ChannelUpdate,
    ChannelFollow,
    ChannelSubscribe,
    ChannelCheer,
    ChannelRaid,
    RedemptionAdd,
    RedemptionUpdate,
    StreamOnline,
    StreamOffline,
}

impl SubscriptionKind {
    pub const ALL: [SubscriptionKind; 9] = [
        SubscriptionKind::ChannelUpdate,
        SubscriptionKind::ChannelFollow,
        SubscriptionKind::ChannelSubscribe,
        SubscriptionKind::ChannelCheer,
        SubscriptionKind::ChannelRaid,
        SubscriptionKind::RedemptionAdd,
        SubscriptionKind::RedemptionUpdate,
        SubscriptionKind::StreamOnline,
        SubscriptionKind::StreamOffline,
    ];

    /// Capability table entry for this kind
    pub fn spec(self) -> &'static KindSpec {
        match self {
            SubscriptionKind::ChannelUpdate => &CHANNEL_UPDATE,
            SubscriptionKind::ChannelFollow => &CHANNEL_FOLLOW,
            SubscriptionKind::ChannelSubscribe => &CHANNEL_SUBSCRIBE,
            SubscriptionKind::ChannelCheer => &CHANNEL_CHEER,
            SubscriptionKind::ChannelRaid => &CHANNEL_RAID,
            SubscriptionKind::RedemptionAdd => &REDEMPTION_ADD,
            SubscriptionKind::RedemptionUpdate => &REDEMPTION_UPDATE,
            SubscriptionKind::StreamOnline => &STREAM_ONLINE,
            SubscriptionKind::StreamOffline => &STREAM_OFFLINE,
        }
    }

    pub fn type_name(self) -> &'static str {
        self.spec().type_name
    }

    pub fn version(self) -> &'static str {
        self.spec().version
    }

    /// Scope the access token needs to create this subscription
    pub fn scope(self) -> Option<&'static str> {
        self.spec().scope
    }

    /// Resolve a remote `(type, version)` pair
    pub fn from_type(type_name: &str, version: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.type_name() == type_name && k.version() == version)
            .ok_or_else(|| Error::UnknownSubscriptionType {
                type_name: type_name.to_string(),
                version: version.to_string(),
            })
    }

    fn accepts(self, key: &str) -> bool {
        let spec = self.spec();
        spec.required.contains(&key) || spec.optional.contains(&key)
    }
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for SubscriptionKind {
    type Err = Error;

    /// Accepts either the snake_case kind name or the remote type name
    fn from_str(s: &str) -> Result<Self> {
        let by_name = serde_json::from_value::<Self>(JsonValue::String(s.to_string())).ok();
        by_name
            .or_else(|| Self::ALL.into_iter().find(|k| k.type_name() == s))
            .ok_or_else(|| Error::UnknownSubscriptionType {
                type_name: s.to_string(),
                version: "any".to_string(),
            })
    }
}

/// Immutable definition of one subscription prior to registration
///
/// The identity is derived once, at construction, from the kind and its
/// condition parameters and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionDescriptor {
    identity: String,
    kind: SubscriptionKind,
    params: BTreeMap<String, String>,
}

impl SubscriptionDescriptor {
    /// Build a descriptor, rejecting parameters the kind does not accept
    pub fn new<I, K, V>(kind: SubscriptionKind, params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let params: BTreeMap<String, String> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let spec = kind.spec();
        for (key, value) in &params {
            if !kind.accepts(key) {
                return Err(Error::invalid_condition(
                    kind.type_name(),
                    format!("unknown condition key '{key}'"),
                ));
            }
            if value.is_empty() || value.contains('.') {
                return Err(Error::invalid_condition(
                    kind.type_name(),
                    format!("invalid value for '{key}': {value:?}"),
                ));
            }
        }
        if let Some(missing) = spec.required.iter().find(|k| !params.contains_key(**k)) {
            return Err(Error::invalid_condition(
                kind.type_name(),
                format!("missing required key '{missing}'"),
            ));
        }
        if spec.needs_qualifier && !spec.optional.iter().any(|k| params.contains_key(*k)) {
            return Err(Error::invalid_condition(
                kind.type_name(),
                format!("one of {} is required", spec.optional.join(", ")),
            ));
        }

        Ok(Self {
            identity: derive_identity(spec, &params),
            kind,
            params,
        })
    }

    /// Channel points redemptions for a broadcaster, optionally one reward
    pub fn redemption_add(broadcaster_user_id: &str, reward_id: Option<&str>) -> Result<Self> {
        let mut params = vec![("broadcaster_user_id", broadcaster_user_id)];
        if let Some(reward_id) = reward_id {
            params.push(("reward_id", reward_id));
        }
        Self::new(SubscriptionKind::RedemptionAdd, params)
    }

    /// Rebuild a descriptor from a remote subscription's type and condition
    ///
    /// Condition keys the kind does not use, and empty values, are ignored.
    pub fn from_remote(type_name: &str, version: &str, condition: &JsonValue) -> Result<Self> {
        let kind = SubscriptionKind::from_type(type_name, version)?;
        let params = condition
            .as_object()
            .into_iter()
            .flat_map(JsonObject::iter)
            .filter(|(key, _)| kind.accepts(key))
            .filter_map(|(key, value)| {
                value
                    .as_str()
                    .filter(|v| !v.is_empty())
                    .map(|v| (key.clone(), v.to_string()))
            });
        Self::new(kind, params)
    }

    /// Canonical identity string
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn kind(&self) -> SubscriptionKind {
        self.kind
    }

    pub fn scope(&self) -> Option<&'static str> {
        self.kind.scope()
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Registration condition object
    pub fn condition(&self) -> JsonValue {
        JsonValue::Object(
            self.params
                .iter()
                .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
                .collect(),
        )
    }

    /// Apply this kind's transform to a raw payload
    pub fn transform(&self, payload: &JsonValue) -> Result<Event> {
        (self.kind.spec().transform)(payload)
    }
}

impl fmt::Display for SubscriptionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity)
    }
}

/// `{type}.{required values}.{key=value for each present qualifier}`
fn derive_identity(spec: &KindSpec, params: &BTreeMap<String, String>) -> String {
    let mut identity = spec.type_name.to_string();
    for key in spec.required {
        if let Some(value) = params.get(*key) {
            identity.push('.');
            identity.push_str(value);
        }
    }
    for key in spec.optional {
        if let Some(value) = params.get(*key) {
            identity.push_str(&format!(".{key}={value}"));
        }
    }
    identity
}
