//! EventSub subscription module
//!
//! # Overview
//!
//! - [`SubscriptionKind`] / [`KindSpec`]: capability table of supported kinds
//! - [`SubscriptionDescriptor`]: kind + condition parameters with a canonical identity
//! - [`Negotiator`]: identity and registration body for a configured [`TransportConfig`]
//! - [`SubscriptionManager`]: register / deliver / unsubscribe state machine
//! - [`webhook`]: signed webhook receiver that feeds the manager
//!
//! # Example
//!
//! ```ignore
//! let manager = SubscriptionManager::new(gateway, Negotiator::new(transport));
//! let descriptor = SubscriptionDescriptor::redemption_add("61369223", None)?;
//! manager.register(descriptor, Arc::new(|event| println!("{event:?}"))).await?;
//! ```

mod events;
mod kinds;
mod manager;
mod negotiator;
mod types;
pub mod verify;
pub mod webhook;

pub use events::{
    Broadcaster, ChannelUpdateEvent, CheerEvent, Event, FollowEvent, RaidEvent, RedemptionEvent,
    RedemptionReward, StreamOfflineEvent, StreamOnlineEvent, SubscribeEvent, User,
};
pub use kinds::{KindSpec, SubscriptionDescriptor, SubscriptionKind, TransformFn};
pub use manager::{EventHandler, SubscriptionManager, SUBSCRIPTIONS_PATH};
pub use negotiator::{Negotiated, Negotiator, TransportConfig};
pub use types::{
    DeliveryOutcome, RemoteSubscription, Revocation, SubscriptionInstance, SubscriptionState,
};
pub use webhook::ReceiverConfig;

#[cfg(test)]
mod tests;
