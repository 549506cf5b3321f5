//! Webhook receiver
//!
//! Axum router that verifies inbound deliveries, answers the callback
//! challenge and feeds notifications and revocations to the manager.

use super::manager::SubscriptionManager;
use super::verify::{
    check_freshness, verify_signature, MessageHistory, MessageType, DEFAULT_HISTORY_SIZE,
    DEFAULT_MAX_MESSAGE_AGE, MESSAGE_ID_HEADER, MESSAGE_SIGNATURE_HEADER,
    MESSAGE_TIMESTAMP_HEADER, MESSAGE_TYPE_HEADER,
};
use super::types::DeliveryOutcome;
use crate::error::{Error, Result, ResultExt};
use crate::types::JsonValue;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_path() -> String {
    "/eventsub".to_string()
}

fn default_max_message_age_secs() -> u64 {
    DEFAULT_MAX_MESSAGE_AGE.as_secs()
}

fn default_history_size() -> usize {
    DEFAULT_HISTORY_SIZE
}

/// Webhook receiver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Route the callback is served under
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_max_message_age_secs")]
    pub max_message_age_secs: u64,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            path: default_path(),
            max_message_age_secs: default_max_message_age_secs(),
            history_size: default_history_size(),
        }
    }
}

struct ReceiverState {
    manager: Arc<SubscriptionManager>,
    secret: String,
    max_age: Duration,
    history: Mutex<MessageHistory>,
}

/// Build the webhook router for `manager`, verifying with `secret`
pub fn router(
    manager: Arc<SubscriptionManager>,
    secret: impl Into<String>,
    config: &ReceiverConfig,
) -> Router {
    let state = ReceiverState {
        manager,
        secret: secret.into(),
        max_age: Duration::from_secs(config.max_message_age_secs),
        history: Mutex::new(MessageHistory::new(config.history_size)),
    };

    Router::new()
        .route(&config.path, post(receive))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Serve `router` on `bind` until Ctrl-C
pub async fn serve(router: Router, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind to {bind}"))?;
    info!("Webhook receiver listening on {}", bind);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
        .context("Webhook server error")?;

    Ok(())
}

async fn receive(
    State(state): State<Arc<ReceiverState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match handle(&state, &headers, &body).await {
        Ok(response) => response,
        Err(err) => {
            let status = match err {
                Error::Signature { .. } => StatusCode::FORBIDDEN,
                _ => StatusCode::BAD_REQUEST,
            };
            warn!(status = status.as_u16(), error = %err, "Rejected webhook message");
            (status, err.to_string()).into_response()
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::webhook(format!("missing header {name}")))
}

async fn handle(state: &ReceiverState, headers: &HeaderMap, body: &[u8]) -> Result<Response> {
    let message_id = header_value(headers, MESSAGE_ID_HEADER)?;
    let timestamp = header_value(headers, MESSAGE_TIMESTAMP_HEADER)?;
    let signature = headers
        .get(MESSAGE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::signature("missing signature header"))?;

    verify_signature(&state.secret, message_id, timestamp, body, signature)?;
    check_freshness(timestamp, chrono::Utc::now(), state.max_age)?;

    let message_type: MessageType = header_value(headers, MESSAGE_TYPE_HEADER)?.parse()?;

    let payload: JsonValue = serde_json::from_slice(body)
        .map_err(|e| Error::webhook(format!("invalid JSON body: {e}")))?;
    let challenge = match message_type {
        MessageType::Verification => Some(
            payload
                .get("challenge")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| Error::webhook("verification message has no challenge"))?,
        ),
        _ => None,
    };

    // Only well-formed messages are remembered, so a rejected one can be redelivered.
    if !state.history.lock().await.record(message_id) {
        debug!(message_id, "Duplicate webhook message acknowledged");
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    match (message_type, challenge) {
        (_, Some(challenge)) => {
            info!(message_id, "Answering webhook callback verification");
            Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain")],
                challenge.to_string(),
            )
                .into_response())
        }
        (MessageType::Notification, _) => {
            match state.manager.identity_for_payload(&payload) {
                Some(identity) => {
                    let outcome = state.manager.deliver(&identity, &payload).await;
                    if let DeliveryOutcome::Malformed(reason) = &outcome {
                        warn!(
                            message_id,
                            identity = %identity,
                            reason = %reason,
                            "Notification not delivered"
                        );
                    }
                }
                None => debug!(message_id, "Notification for unrecognised subscription"),
            }
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        (MessageType::Revocation, _) => {
            let reason = payload
                .pointer("/subscription/status")
                .and_then(JsonValue::as_str)
                .unwrap_or("revoked")
                .to_string();
            if let Some(identity) = state.manager.identity_for_payload(&payload) {
                state.manager.revoke_remote(&identity, reason).await;
            }
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        (MessageType::Verification, None) => {
            Err(Error::webhook("verification message has no challenge"))
        }
    }
}
