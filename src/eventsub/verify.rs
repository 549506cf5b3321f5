//! Webhook message verification
//!
//! Signature, freshness and replay checks for inbound webhook deliveries.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::{HashSet, VecDeque};
use std::str::FromStr;
use std::time::Duration;

pub const MESSAGE_ID_HEADER: &str = "Twitch-Eventsub-Message-Id";
pub const MESSAGE_TIMESTAMP_HEADER: &str = "Twitch-Eventsub-Message-Timestamp";
pub const MESSAGE_SIGNATURE_HEADER: &str = "Twitch-Eventsub-Message-Signature";
pub const MESSAGE_TYPE_HEADER: &str = "Twitch-Eventsub-Message-Type";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Messages older than this are rejected
pub const DEFAULT_MAX_MESSAGE_AGE: Duration = Duration::from_secs(600);

/// Number of message ids remembered for replay detection
pub const DEFAULT_HISTORY_SIZE: usize = 50;

type HmacSha256 = Hmac<Sha256>;

/// Value of the message type header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Notification,
    Verification,
    Revocation,
}

impl FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "notification" => Ok(MessageType::Notification),
            "webhook_callback_verification" => Ok(MessageType::Verification),
            "revocation" => Ok(MessageType::Revocation),
            other => Err(Error::webhook(format!("unknown message type '{other}'"))),
        }
    }
}

fn message_mac(secret: &str, message_id: &str, timestamp: &str, body: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::signature(format!("invalid secret: {e}")))?;
    mac.update(message_id.as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(body);
    Ok(mac)
}

/// Signature header value for a message
pub fn sign(secret: &str, message_id: &str, timestamp: &str, body: &[u8]) -> Result<String> {
    let mac = message_mac(secret, message_id, timestamp, body)?;
    Ok(format!(
        "{SIGNATURE_PREFIX}{}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Check `signature` against HMAC-SHA256 over id, timestamp and raw body
pub fn verify_signature(
    secret: &str,
    message_id: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
) -> Result<()> {
    let digest = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or_else(|| Error::signature("signature must start with sha256="))?;
    let expected =
        hex::decode(digest).map_err(|_| Error::signature("signature is not valid hex"))?;

    message_mac(secret, message_id, timestamp, body)?
        .verify_slice(&expected)
        .map_err(|_| Error::signature("signature mismatch"))
}

/// Parse the message timestamp and reject it if older than `max_age`
///
/// Timestamps slightly in the future (clock skew) are accepted.
pub fn check_freshness(
    timestamp: &str,
    now: DateTime<Utc>,
    max_age: Duration,
) -> Result<DateTime<Utc>> {
    let sent = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| Error::webhook(format!("invalid timestamp '{timestamp}': {e}")))?
        .with_timezone(&Utc);

    let age_ms = now.signed_duration_since(sent).num_milliseconds();
    let max_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
    if age_ms > max_ms {
        return Err(Error::webhook(format!(
            "message is {}s old (limit {}s)",
            age_ms / 1000,
            max_age.as_secs()
        )));
    }
    Ok(sent)
}

/// Bounded set of recently seen message ids
#[derive(Debug)]
pub struct MessageHistory {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl MessageHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Remember `id`; returns false if it was already seen
    pub fn record(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.seen.insert(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}
