//! Typed event payloads
//!
//! One struct per subscription kind, deserialised from the `event` object of
//! a notification.

use super::kinds::SubscriptionKind;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Broadcaster fields shared by every channel event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broadcaster {
    pub broadcaster_user_id: String,
    pub broadcaster_user_login: String,
    pub broadcaster_user_name: String,
}

/// The user that triggered an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub user_login: String,
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelUpdateEvent {
    #[serde(flatten)]
    pub broadcaster: Broadcaster,
    pub title: String,
    pub language: String,
    pub category_id: String,
    pub category_name: String,
    #[serde(default)]
    pub content_classification_labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEvent {
    #[serde(flatten)]
    pub broadcaster: Broadcaster,
    #[serde(flatten)]
    pub user: User,
    pub followed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeEvent {
    #[serde(flatten)]
    pub broadcaster: Broadcaster,
    #[serde(flatten)]
    pub user: User,
    /// "1000", "2000" or "3000"
    pub tier: String,
    pub is_gift: bool,
}

/// Anonymous cheers carry no user fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheerEvent {
    #[serde(flatten)]
    pub broadcaster: Broadcaster,
    pub is_anonymous: bool,
    pub user_id: Option<String>,
    pub user_login: Option<String>,
    pub user_name: Option<String>,
    pub message: String,
    pub bits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaidEvent {
    pub from_broadcaster_user_id: String,
    pub from_broadcaster_user_login: String,
    pub from_broadcaster_user_name: String,
    pub to_broadcaster_user_id: String,
    pub to_broadcaster_user_login: String,
    pub to_broadcaster_user_name: String,
    pub viewers: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionReward {
    pub id: String,
    pub title: String,
    pub cost: u64,
    #[serde(default)]
    pub prompt: String,
}

/// Channel points redemption, used by both the add and update kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionEvent {
    pub id: String,
    #[serde(flatten)]
    pub broadcaster: Broadcaster,
    #[serde(flatten)]
    pub user: User,
    #[serde(default)]
    pub user_input: String,
    /// unfulfilled, fulfilled, canceled or unknown
    pub status: String,
    pub reward: RedemptionReward,
    pub redeemed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOnlineEvent {
    pub id: String,
    #[serde(flatten)]
    pub broadcaster: Broadcaster,
    /// live, playlist, watch_party, premiere or rerun
    #[serde(rename = "type")]
    pub stream_type: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOfflineEvent {
    #[serde(flatten)]
    pub broadcaster: Broadcaster,
}

/// A decoded event handed to subscription handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum Event {
    ChannelUpdate(ChannelUpdateEvent),
    ChannelFollow(FollowEvent),
    ChannelSubscribe(SubscribeEvent),
    ChannelCheer(CheerEvent),
    ChannelRaid(RaidEvent),
    RedemptionAdd(RedemptionEvent),
    RedemptionUpdate(RedemptionEvent),
    StreamOnline(StreamOnlineEvent),
    StreamOffline(StreamOfflineEvent),
}

impl Event {
    /// The subscription kind that produces this event
    pub fn kind(&self) -> SubscriptionKind {
        match self {
            Event::ChannelUpdate(_) => SubscriptionKind::ChannelUpdate,
            Event::ChannelFollow(_) => SubscriptionKind::ChannelFollow,
            Event::ChannelSubscribe(_) => SubscriptionKind::ChannelSubscribe,
            Event::ChannelCheer(_) => SubscriptionKind::ChannelCheer,
            Event::ChannelRaid(_) => SubscriptionKind::ChannelRaid,
            Event::RedemptionAdd(_) => SubscriptionKind::RedemptionAdd,
            Event::RedemptionUpdate(_) => SubscriptionKind::RedemptionUpdate,
            Event::StreamOnline(_) => SubscriptionKind::StreamOnline,
            Event::StreamOffline(_) => SubscriptionKind::StreamOffline,
        }
    }

    /// Broadcaster the event belongs to; raids report the raided channel
    pub fn broadcaster_user_id(&self) -> &str {
        match self {
            Event::ChannelUpdate(e) => &e.broadcaster.broadcaster_user_id,
            Event::ChannelFollow(e) => &e.broadcaster.broadcaster_user_id,
            Event::ChannelSubscribe(e) => &e.broadcaster.broadcaster_user_id,
            Event::ChannelCheer(e) => &e.broadcaster.broadcaster_user_id,
            Event::ChannelRaid(e) => &e.to_broadcaster_user_id,
            Event::RedemptionAdd(e) | Event::RedemptionUpdate(e) => {
                &e.broadcaster.broadcaster_user_id
            }
            Event::StreamOnline(e) => &e.broadcaster.broadcaster_user_id,
            Event::StreamOffline(e) => &e.broadcaster.broadcaster_user_id,
        }
    }
}

/// Deserialise the `event` object of a raw notification payload
pub(crate) fn event_body<T: DeserializeOwned>(payload: &JsonValue) -> Result<T> {
    let event = payload
        .get("event")
        .filter(|e| e.is_object())
        .ok_or_else(|| Error::decode("notification has no 'event' object"))?;
    T::deserialize(event).map_err(|e| Error::decode(e.to_string()))
}
