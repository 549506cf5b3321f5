//! Typed domain entities
//!
//! An [`Entity`] is one decoded item plus a non-owning handle on the gateway
//! it came from, so entity-level helpers can issue follow-up calls without
//! keeping the client alive.

use crate::error::{Error, Result};
use crate::http::Gateway;
use crate::types::JsonValue;
use serde::de::DeserializeOwned;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

/// A decoded item with a back-reference to its gateway
pub struct Entity<T> {
    data: T,
    gateway: Weak<dyn Gateway>,
}

impl<T> Entity<T> {
    /// Wrap a decoded value
    pub fn new(data: T, gateway: &Arc<dyn Gateway>) -> Self {
        Self {
            data,
            gateway: Arc::downgrade(gateway),
        }
    }

    /// The gateway this entity was fetched through, if it is still alive
    pub fn gateway(&self) -> Option<Arc<dyn Gateway>> {
        self.gateway.upgrade()
    }

    /// Borrow the decoded value
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Drop the gateway reference and keep the value
    pub fn into_inner(self) -> T {
        self.data
    }
}

impl<T> Deref for Entity<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T: Clone> Clone for Entity<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            gateway: Weak::clone(&self.gateway),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Entity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("data", &self.data)
            .field("gateway_alive", &(self.gateway.strong_count() > 0))
            .finish()
    }
}

/// Decode raw page items into entities, failing on the first bad item
pub fn decode_entities<T: DeserializeOwned>(
    items: Vec<JsonValue>,
    gateway: &Arc<dyn Gateway>,
) -> Result<Vec<Entity<T>>> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            serde_json::from_value(raw)
                .map(|data| Entity::new(data, gateway))
                .map_err(|e| Error::decode(format!("item {index}: {e}")))
        })
        .collect()
}
