//! Transport negotiation
//!
//! Pure mapping from a descriptor to its identity and registration request.

use super::kinds::SubscriptionDescriptor;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Webhook secrets must be 10 to 100 ASCII characters
const SECRET_LEN: std::ops::RangeInclusive<usize> = 10..=100;

/// How a registered subscription's events reach this client
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum TransportConfig {
    /// HTTPS callback signed with a shared secret
    Webhook { callback: String, secret: String },
    /// Open WebSocket session
    Websocket { session_id: String },
    /// Conduit shared by several shards
    Conduit { conduit_id: String },
}

impl TransportConfig {
    pub fn webhook(callback: impl Into<String>, secret: impl Into<String>) -> Self {
        TransportConfig::Webhook {
            callback: callback.into(),
            secret: secret.into(),
        }
    }

    pub fn websocket(session_id: impl Into<String>) -> Self {
        TransportConfig::Websocket {
            session_id: session_id.into(),
        }
    }

    pub fn conduit(conduit_id: impl Into<String>) -> Self {
        TransportConfig::Conduit {
            conduit_id: conduit_id.into(),
        }
    }

    /// Delivery method name used on the wire
    pub fn method(&self) -> &'static str {
        match self {
            TransportConfig::Webhook { .. } => "webhook",
            TransportConfig::Websocket { .. } => "websocket",
            TransportConfig::Conduit { .. } => "conduit",
        }
    }

    /// Signing secret for webhook transports
    pub fn secret(&self) -> Option<&str> {
        match self {
            TransportConfig::Webhook { secret, .. } => Some(secret),
            _ => None,
        }
    }

    /// Whether a remote subscription's `transport` object delivers to this transport
    pub fn matches_remote(&self, remote: &JsonValue) -> bool {
        let field = |key: &str| remote.get(key).and_then(JsonValue::as_str);
        if field("method") != Some(self.method()) {
            return false;
        }
        match self {
            TransportConfig::Webhook { callback, .. } => field("callback") == Some(callback),
            TransportConfig::Websocket { session_id } => field("session_id") == Some(session_id),
            TransportConfig::Conduit { conduit_id } => field("conduit_id") == Some(conduit_id),
        }
    }

    /// Check the transport is acceptable to the remote service
    pub fn validate(&self) -> Result<()> {
        match self {
            TransportConfig::Webhook { callback, secret } => {
                let url = url::Url::parse(callback).map_err(|e| {
                    Error::invalid_value("eventsub.transport.callback", e.to_string())
                })?;
                if url.scheme() != "https" {
                    return Err(Error::invalid_value(
                        "eventsub.transport.callback",
                        "callback must use https",
                    ));
                }
                if !secret.is_ascii() || !SECRET_LEN.contains(&secret.len()) {
                    return Err(Error::invalid_value(
                        "eventsub.transport.secret",
                        "secret must be 10 to 100 ASCII characters",
                    ));
                }
                Ok(())
            }
            TransportConfig::Websocket { session_id: id }
            | TransportConfig::Conduit { conduit_id: id } => {
                if id.trim().is_empty() {
                    return Err(Error::missing_field(format!(
                        "eventsub.transport.{}",
                        self.id_field()
                    )));
                }
                Ok(())
            }
        }
    }

    fn id_field(&self) -> &'static str {
        match self {
            TransportConfig::Webhook { .. } => "callback",
            TransportConfig::Websocket { .. } => "session_id",
            TransportConfig::Conduit { .. } => "conduit_id",
        }
    }

    /// Wire form sent in the registration body
    pub fn to_json(&self) -> JsonValue {
        match self {
            TransportConfig::Webhook { callback, secret } => json!({
                "method": "webhook",
                "callback": callback,
                "secret": secret,
            }),
            TransportConfig::Websocket { session_id } => json!({
                "method": "websocket",
                "session_id": session_id,
            }),
            TransportConfig::Conduit { conduit_id } => json!({
                "method": "conduit",
                "conduit_id": conduit_id,
            }),
        }
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportConfig::Webhook { callback, .. } => f
                .debug_struct("Webhook")
                .field("callback", callback)
                .field("secret", &"[REDACTED]")
                .finish(),
            TransportConfig::Websocket { session_id } => f
                .debug_struct("Websocket")
                .field("session_id", session_id)
                .finish(),
            TransportConfig::Conduit { conduit_id } => f
                .debug_struct("Conduit")
                .field("conduit_id", conduit_id)
                .finish(),
        }
    }
}

/// Everything needed to register one descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct Negotiated {
    pub identity: String,
    pub transport: TransportConfig,
    /// `{type, version, condition, transport}` registration body
    pub body: JsonValue,
}

/// Builds registration requests for a fixed transport
#[derive(Debug, Clone)]
pub struct Negotiator {
    transport: TransportConfig,
}

impl Negotiator {
    pub fn new(transport: TransportConfig) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Derive identity and registration body for `descriptor`
    ///
    /// Deterministic: the same descriptor always yields the same output.
    pub fn negotiate(&self, descriptor: &SubscriptionDescriptor) -> Negotiated {
        let kind = descriptor.kind();
        Negotiated {
            identity: descriptor.identity().to_string(),
            transport: self.transport.clone(),
            body: json!({
                "type": kind.type_name(),
                "version": kind.version(),
                "condition": descriptor.condition(),
                "transport": self.transport.to_json(),
            }),
        }
    }
}
