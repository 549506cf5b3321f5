//! Tests for eventsub module

use super::verify::*;
use super::*;
use crate::error::Error;
use crate::http::stub::StubGateway;
use crate::types::Method;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration as ChronoDuration, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use test_case::test_case;
use tower::ServiceExt;

const SECRET: &str = "s3cre7-webhook-secret";
const CALLBACK: &str = "https://example.com/eventsub";
const REDEMPTION_ADD: &str = "channel.channel_points_custom_reward_redemption.add";

// ============================================================================
// Fixtures
// ============================================================================

fn counting_handler() -> (EventHandler, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let handler: EventHandler = Arc::new(move |_event: &Event| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (handler, count)
}

fn noop_handler() -> EventHandler {
    Arc::new(|_event: &Event| {})
}

fn manager(stub: &Arc<StubGateway>) -> SubscriptionManager {
    SubscriptionManager::new(
        stub.clone(),
        Negotiator::new(TransportConfig::webhook(CALLBACK, SECRET)),
    )
}

fn remote(id: &str, type_name: &str, status: &str, condition: Value) -> Value {
    json!({
        "id": id,
        "status": status,
        "type": type_name,
        "version": "1",
        "condition": condition,
        "created_at": "2026-10-15T12:00:00Z",
        "transport": {"method": "webhook", "callback": CALLBACK},
        "cost": 0
    })
}

fn created(id: &str, type_name: &str, condition: Value) -> Value {
    json!({
        "data": [remote(id, type_name, "webhook_callback_verification_pending", condition)],
        "total": 1,
        "total_cost": 0,
        "max_total_cost": 10000
    })
}

fn redemption_event() -> Value {
    json!({
        "id": "17fa2df1-ad76-4804-bfa5-a40ef63efe63",
        "broadcaster_user_id": "61369223",
        "broadcaster_user_login": "streamer",
        "broadcaster_user_name": "Streamer",
        "user_id": "9001",
        "user_login": "viewer",
        "user_name": "Viewer",
        "user_input": "hello",
        "status": "unfulfilled",
        "reward": {"id": "r1", "title": "Hydrate", "cost": 100, "prompt": "Drink water"},
        "redeemed_at": "2026-10-15T12:00:00.171067Z"
    })
}

fn redemption_payload(subscription_id: &str) -> Value {
    json!({
        "subscription": {
            "id": subscription_id,
            "type": REDEMPTION_ADD,
            "version": "1",
            "status": "enabled",
            "condition": {"broadcaster_user_id": "61369223", "reward_id": ""}
        },
        "event": redemption_event()
    })
}

fn stream_online_payload() -> Value {
    json!({
        "subscription": {
            "id": "sub-online",
            "type": "stream.online",
            "version": "1",
            "condition": {"broadcaster_user_id": "1337"}
        },
        "event": {
            "id": "9001",
            "broadcaster_user_id": "1337",
            "broadcaster_user_login": "cool_user",
            "broadcaster_user_name": "Cool_User",
            "type": "live",
            "started_at": "2026-10-15T10:11:12.123Z"
        }
    })
}

fn redemption() -> SubscriptionDescriptor {
    SubscriptionDescriptor::redemption_add("61369223", None).unwrap()
}

fn redemption_created() -> Value {
    created("sub-1", REDEMPTION_ADD, json!({"broadcaster_user_id": "61369223", "reward_id": ""}))
}

// ============================================================================
// Kind & Descriptor Tests
// ============================================================================

#[test]
fn test_identity_omits_absent_qualifier() {
    let plain = SubscriptionDescriptor::redemption_add("61369223", None).unwrap();
    let reward = SubscriptionDescriptor::redemption_add("61369223", Some("r1")).unwrap();

    assert_eq!(
        plain.identity(),
        "channel.channel_points_custom_reward_redemption.add.61369223"
    );
    assert_eq!(
        reward.identity(),
        "channel.channel_points_custom_reward_redemption.add.61369223.reward_id=r1"
    );
    assert_ne!(plain.identity(), reward.identity());
}

#[test]
fn test_identity_is_deterministic() {
    let a = SubscriptionDescriptor::new(
        SubscriptionKind::ChannelFollow,
        [("moderator_user_id", "2"), ("broadcaster_user_id", "1")],
    )
    .unwrap();
    let b = SubscriptionDescriptor::new(
        SubscriptionKind::ChannelFollow,
        [("broadcaster_user_id", "1"), ("moderator_user_id", "2")],
    )
    .unwrap();

    assert_eq!(a.identity(), "channel.follow.1.2");
    assert_eq!(a, b);
}

#[test]
fn test_raid_requires_a_qualifier() {
    let err = SubscriptionDescriptor::new(SubscriptionKind::ChannelRaid, Vec::<(&str, &str)>::new())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCondition { .. }));

    let raid = SubscriptionDescriptor::new(
        SubscriptionKind::ChannelRaid,
        [("to_broadcaster_user_id", "42")],
    )
    .unwrap();
    assert_eq!(raid.identity(), "channel.raid.to_broadcaster_user_id=42");
    assert_eq!(raid.scope(), None);
}

#[test_case(&[("broadcaster_user_id", "1"), ("user_id", "2")] ; "unknown key")]
#[test_case(&[("reward_id", "r1")] ; "missing required key")]
#[test_case(&[("broadcaster_user_id", "")] ; "empty value")]
#[test_case(&[("broadcaster_user_id", "1.2")] ; "dotted value")]
fn test_descriptor_rejects_bad_params(params: &[(&str, &str)]) {
    let err = SubscriptionDescriptor::new(SubscriptionKind::RedemptionAdd, params.iter().copied())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCondition { .. }), "{err}");
}

#[test]
fn test_descriptor_from_remote_condition() {
    let descriptor = SubscriptionDescriptor::from_remote(
        REDEMPTION_ADD,
        "1",
        &json!({"broadcaster_user_id": "61369223", "reward_id": "", "extra": "x"}),
    )
    .unwrap();
    assert_eq!(descriptor, redemption());

    let err = SubscriptionDescriptor::from_remote("channel.unknown", "1", &json!({})).unwrap_err();
    assert!(matches!(err, Error::UnknownSubscriptionType { .. }));
}

#[test]
fn test_kind_table_is_consistent() {
    for kind in SubscriptionKind::ALL {
        assert_eq!(
            SubscriptionKind::from_type(kind.type_name(), kind.version()).unwrap(),
            kind
        );
    }
    assert!(SubscriptionKind::from_type("channel.update", "1").is_err());
}

#[test_case("redemption_add", SubscriptionKind::RedemptionAdd ; "snake case name")]
#[test_case("stream.online", SubscriptionKind::StreamOnline ; "remote type name")]
fn test_kind_from_str(input: &str, expected: SubscriptionKind) {
    assert_eq!(input.parse::<SubscriptionKind>().unwrap(), expected);
}

#[test]
fn test_transform_redemption_payload() {
    let event = redemption().transform(&redemption_payload("sub-1")).unwrap();

    assert_eq!(event.kind(), SubscriptionKind::RedemptionAdd);
    assert_eq!(event.broadcaster_user_id(), "61369223");
    match event {
        Event::RedemptionAdd(e) => {
            assert_eq!(e.reward.cost, 100);
            assert_eq!(e.user.user_login, "viewer");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_transform_stream_online() {
    let descriptor = SubscriptionDescriptor::new(
        SubscriptionKind::StreamOnline,
        [("broadcaster_user_id", "1337")],
    )
    .unwrap();
    let event = descriptor.transform(&stream_online_payload()).unwrap();
    match event {
        Event::StreamOnline(e) => assert_eq!(e.stream_type, "live"),
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_transform_rejects_malformed_payload() {
    let err = redemption().transform(&json!({"subscription": {}})).unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));

    let err = redemption()
        .transform(&json!({"event": {"id": "x"}}))
        .unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

// ============================================================================
// Negotiator Tests
// ============================================================================

#[test]
fn test_negotiate_webhook_body() {
    let negotiator = Negotiator::new(TransportConfig::webhook(CALLBACK, SECRET));
    let negotiated = negotiator.negotiate(&redemption());

    assert_eq!(negotiated.identity, redemption().identity());
    assert_eq!(
        negotiated.body,
        json!({
            "type": REDEMPTION_ADD,
            "version": "1",
            "condition": {"broadcaster_user_id": "61369223"},
            "transport": {"method": "webhook", "callback": CALLBACK, "secret": SECRET}
        })
    );
    assert_eq!(negotiator.negotiate(&redemption()), negotiated);
}

#[test]
fn test_negotiate_websocket_body() {
    let negotiator = Negotiator::new(TransportConfig::websocket("session-1"));
    let negotiated = negotiator.negotiate(&redemption());
    assert_eq!(
        negotiated.body["transport"],
        json!({"method": "websocket", "session_id": "session-1"})
    );
}

#[test]
fn test_transport_debug_redacts_secret() {
    let debug = format!("{:?}", TransportConfig::webhook(CALLBACK, SECRET));
    assert!(!debug.contains(SECRET));
    assert!(debug.contains("[REDACTED]"));
}

#[test]
fn test_transport_validation() {
    assert!(TransportConfig::webhook(CALLBACK, SECRET).validate().is_ok());
    assert!(TransportConfig::webhook("http://example.com/cb", SECRET)
        .validate()
        .is_err());
    assert!(TransportConfig::webhook(CALLBACK, "short").validate().is_err());
    assert!(TransportConfig::websocket("  ").validate().is_err());
    assert!(TransportConfig::conduit("c-1").validate().is_ok());
}

#[test]
fn test_transport_from_yaml() {
    let transport: TransportConfig =
        serde_yaml::from_str("method: websocket\nsession_id: abc\n").unwrap();
    assert_eq!(transport, TransportConfig::websocket("abc"));
    assert_eq!(transport.method(), "websocket");
}

#[test]
fn test_transport_matches_remote() {
    let webhook = TransportConfig::webhook(CALLBACK, SECRET);
    assert!(webhook.matches_remote(&json!({"method": "webhook", "callback": CALLBACK})));
    let elsewhere = json!({"method": "webhook", "callback": "https://other.example"});
    assert!(!webhook.matches_remote(&elsewhere));
    assert!(!webhook.matches_remote(&json!({"method": "websocket", "session_id": "abc"})));

    let websocket = TransportConfig::websocket("abc");
    assert!(websocket.matches_remote(&json!({"method": "websocket", "session_id": "abc"})));
    assert!(!websocket.matches_remote(&json!({"method": "websocket", "session_id": "xyz"})));
    assert!(!TransportConfig::conduit("c-1").matches_remote(&Value::Null));
}

// ============================================================================
// Verification Tests
// ============================================================================

#[test]
fn test_signature_roundtrip() {
    let body = br#"{"challenge":"abc"}"#;
    let signature = sign(SECRET, "msg-1", "2026-10-15T12:00:00Z", body).unwrap();
    assert!(signature.starts_with("sha256="));

    verify_signature(SECRET, "msg-1", "2026-10-15T12:00:00Z", body, &signature).unwrap();
}

#[test]
fn test_signature_rejects_tampering() {
    let body = br#"{"challenge":"abc"}"#;
    let signature = sign(SECRET, "msg-1", "2026-10-15T12:00:00Z", body).unwrap();

    let err = verify_signature(SECRET, "msg-1", "2026-10-15T12:00:00Z", b"{}", &signature)
        .unwrap_err();
    assert!(matches!(err, Error::Signature { .. }));

    assert!(verify_signature(SECRET, "msg-2", "2026-10-15T12:00:00Z", body, &signature).is_err());
    assert!(verify_signature("other-secret", "msg-1", "2026-10-15T12:00:00Z", body, &signature)
        .is_err());
    assert!(verify_signature(SECRET, "msg-1", "2026-10-15T12:00:00Z", body, "deadbeef").is_err());
}

#[test]
fn test_freshness_window() {
    let now = Utc::now();
    let recent = (now - ChronoDuration::minutes(1)).to_rfc3339();
    let stale = (now - ChronoDuration::minutes(11)).to_rfc3339();
    let future = (now + ChronoDuration::seconds(30)).to_rfc3339();

    assert!(check_freshness(&recent, now, DEFAULT_MAX_MESSAGE_AGE).is_ok());
    assert!(check_freshness(&future, now, DEFAULT_MAX_MESSAGE_AGE).is_ok());
    assert!(check_freshness(&stale, now, DEFAULT_MAX_MESSAGE_AGE).is_err());
    assert!(check_freshness("yesterday", now, DEFAULT_MAX_MESSAGE_AGE).is_err());
}

#[test]
fn test_message_history_evicts_oldest() {
    let mut history = MessageHistory::new(2);
    assert!(history.record("a"));
    assert!(!history.record("a"));
    assert!(history.record("b"));
    assert!(history.record("c"));

    assert_eq!(history.len(), 2);
    assert!(!history.contains("a"));
    assert!(history.record("a"), "evicted id is accepted again");
}

#[test]
fn test_message_type_parse() {
    assert_eq!(
        "webhook_callback_verification".parse::<MessageType>().unwrap(),
        MessageType::Verification
    );
    assert!("ping".parse::<MessageType>().is_err());
}

// ============================================================================
// Manager Tests
// ============================================================================

#[tokio::test]
async fn test_register_creates_remote_subscription() {
    let stub = Arc::new(StubGateway::new());
    stub.respond(redemption_created());
    let manager = manager(&stub);

    let instance = manager.register(redemption(), noop_handler()).await.unwrap();

    assert_eq!(instance.state, SubscriptionState::Active);
    assert_eq!(instance.remote_id.as_deref(), Some("sub-1"));
    assert_eq!(
        instance.remote_status.as_deref(),
        Some("webhook_callback_verification_pending")
    );

    let calls = stub.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::POST);
    assert_eq!(calls[0].path, SUBSCRIPTIONS_PATH);
    assert_eq!(calls[0].request.scope.as_deref(), Some("channel:read:redemptions"));
    assert_eq!(
        calls[0].request.body.as_ref().unwrap()["type"],
        json!(REDEMPTION_ADD)
    );
}

#[tokio::test]
async fn test_concurrent_register_makes_one_remote_call() {
    let stub = Arc::new(StubGateway::with_delay(Duration::from_millis(50)));
    stub.respond(redemption_created());
    let manager = manager(&stub);
    let (first, first_count) = counting_handler();
    let (second, second_count) = counting_handler();

    let (a, b) = tokio::join!(
        manager.register(redemption(), first),
        manager.register(redemption(), second)
    );

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.remote_id, b.remote_id);
    assert_eq!(a.handlers.max(b.handlers), 2);
    assert_eq!(stub.call_count(), 1);

    let outcome = manager
        .deliver(redemption().identity(), &redemption_payload("sub-1"))
        .await;
    assert_eq!(outcome, DeliveryOutcome::Delivered(2));
    assert_eq!(first_count.load(Ordering::SeqCst), 1);
    assert_eq!(second_count.load(Ordering::SeqCst), 1);
}

async fn wait_for_calls(stub: &StubGateway, count: usize) {
    while stub.call_count() < count {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_unsubscribe_waits_for_pending_register() {
    let stub = Arc::new(StubGateway::with_delay(Duration::from_millis(50)));
    stub.respond(redemption_created()).respond(Value::Null);
    let manager = Arc::new(manager(&stub));
    let identity = redemption().identity().to_string();

    let registering = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.register(redemption(), noop_handler()).await })
    };
    wait_for_calls(&stub, 1).await;

    let revocation = manager.unsubscribe(&identity).await;
    let registered = registering.await.unwrap().unwrap();

    assert_eq!(registered.state, SubscriptionState::Active);
    assert_eq!(revocation, Revocation::Confirmed);
    let methods: Vec<_> = stub.calls().iter().map(|c| c.method).collect();
    assert_eq!(methods, vec![Method::POST, Method::DELETE]);
    assert_eq!(
        manager.instance(&identity).await.unwrap().state,
        SubscriptionState::Revoked
    );
}

#[tokio::test]
async fn test_deliver_waits_for_pending_register() {
    let stub = Arc::new(StubGateway::with_delay(Duration::from_millis(50)));
    stub.respond(redemption_created());
    let manager = Arc::new(manager(&stub));
    let (handler, count) = counting_handler();

    let registering = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.register(redemption(), handler).await })
    };
    wait_for_calls(&stub, 1).await;

    let outcome = manager
        .deliver(redemption().identity(), &redemption_payload("sub-1"))
        .await;
    registering.await.unwrap().unwrap();

    assert_eq!(outcome, DeliveryOutcome::Delivered(1));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_distinct_identities_register_concurrently() {
    let delay = Duration::from_millis(200);
    let stub = Arc::new(StubGateway::with_delay(delay));
    stub.respond(redemption_created()).respond(created(
        "sub-online",
        "stream.online",
        json!({"broadcaster_user_id": "1337"}),
    ));
    let manager = manager(&stub);
    let online = SubscriptionDescriptor::new(
        SubscriptionKind::StreamOnline,
        [("broadcaster_user_id", "1337")],
    )
    .unwrap();

    let started = std::time::Instant::now();
    let (a, b) = tokio::join!(
        manager.register(redemption(), noop_handler()),
        manager.register(online, noop_handler())
    );
    let elapsed = started.elapsed();

    assert_eq!(a.unwrap().state, SubscriptionState::Active);
    assert_eq!(b.unwrap().state, SubscriptionState::Active);
    assert_eq!(stub.call_count(), 2);
    assert!(elapsed < delay * 2, "registrations ran one after another: {elapsed:?}");
}

#[tokio::test]
async fn test_register_failure_marks_failed() {
    let stub = Arc::new(StubGateway::new());
    stub.fail(Error::gateway(403, "subscription missing proper authorization"))
        .respond(redemption_created());
    let manager = manager(&stub);

    let err = manager
        .register(redemption(), noop_handler())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));

    let instance = manager.instance(redemption().identity()).await.unwrap();
    assert_eq!(instance.state, SubscriptionState::Failed);

    let retried = manager.register(redemption(), noop_handler()).await.unwrap();
    assert_eq!(retried.state, SubscriptionState::Active);
    assert_eq!(retried.handlers, 1);
}

#[tokio::test]
async fn test_register_conflict_adopts_remote_subscription() {
    let other = json!({"broadcaster_user_id": "1", "reward_id": ""});
    let same = json!({"broadcaster_user_id": "61369223", "reward_id": ""});
    let stub = Arc::new(StubGateway::new());
    stub.fail(Error::gateway(409, "subscription already exists"))
        .respond(json!({
            "data": [
                remote("other", REDEMPTION_ADD, "enabled", other),
                remote("existing", REDEMPTION_ADD, "enabled", same)
            ],
            "total": 2,
            "pagination": {}
        }));
    let manager = manager(&stub);

    let instance = manager.register(redemption(), noop_handler()).await.unwrap();
    assert_eq!(instance.state, SubscriptionState::Active);
    assert_eq!(instance.remote_id.as_deref(), Some("existing"));

    let lookup = &stub.calls()[1];
    assert_eq!(lookup.method, Method::GET);
    assert_eq!(lookup.request.query_value("type"), Some(REDEMPTION_ADD));
}

#[tokio::test]
async fn test_register_conflict_adopts_only_matching_transport() {
    let condition = json!({"broadcaster_user_id": "61369223", "reward_id": ""});
    let mut websocket = remote("ws-sub", REDEMPTION_ADD, "enabled", condition.clone());
    websocket["transport"] = json!({"method": "websocket", "session_id": "AgoQ"});
    let mut elsewhere = remote("other-hook", REDEMPTION_ADD, "enabled", condition.clone());
    elsewhere["transport"] = json!({"method": "webhook", "callback": "https://other.example/hook"});

    let stub = Arc::new(StubGateway::new());
    stub.fail(Error::gateway(409, "subscription already exists"))
        .respond(json!({
            "data": [
                websocket,
                elsewhere,
                remote("hook-sub", REDEMPTION_ADD, "enabled", condition)
            ],
            "pagination": {}
        }));
    let manager = manager(&stub);

    let instance = manager.register(redemption(), noop_handler()).await.unwrap();
    assert_eq!(instance.remote_id.as_deref(), Some("hook-sub"));
}

#[tokio::test]
async fn test_register_conflict_without_match_fails() {
    let condition = json!({"broadcaster_user_id": "61369223"});
    let stub = Arc::new(StubGateway::new());
    stub.fail(Error::gateway(409, "subscription already exists"))
        .respond(json!({
            "data": [remote("gone", REDEMPTION_ADD, "authorization_revoked", condition)],
            "pagination": {}
        }));
    let manager = manager(&stub);

    let err = manager
        .register(redemption(), noop_handler())
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(
        manager.instance(redemption().identity()).await.unwrap().state,
        SubscriptionState::Failed
    );
}

#[tokio::test]
async fn test_deliver_unknown_identity_is_noop() {
    let stub = Arc::new(StubGateway::new());
    let manager = manager(&stub);

    let outcome = manager
        .deliver("stream.online.1", &stream_online_payload())
        .await;
    assert_eq!(outcome, DeliveryOutcome::Discarded);
    assert_eq!(stub.call_count(), 0);
}

#[tokio::test]
async fn test_malformed_payload_is_isolated() {
    let stub = Arc::new(StubGateway::new());
    stub.respond(redemption_created()).respond(created(
        "sub-online",
        "stream.online",
        json!({"broadcaster_user_id": "1337"}),
    ));
    let manager = manager(&stub);
    let online = SubscriptionDescriptor::new(
        SubscriptionKind::StreamOnline,
        [("broadcaster_user_id", "1337")],
    )
    .unwrap();
    let (handler, count) = counting_handler();

    manager.register(redemption(), noop_handler()).await.unwrap();
    manager.register(online.clone(), handler).await.unwrap();

    let outcome = manager
        .deliver(redemption().identity(), &json!({"event": {"id": 1}}))
        .await;
    assert!(matches!(outcome, DeliveryOutcome::Malformed(_)));

    let outcome = manager
        .deliver(online.identity(), &stream_online_payload())
        .await;
    assert_eq!(outcome, DeliveryOutcome::Delivered(1));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unsubscribe_is_idempotent() {
    let stub = Arc::new(StubGateway::new());
    stub.respond(redemption_created()).respond(Value::Null);
    let manager = manager(&stub);
    let identity = redemption().identity().to_string();

    manager.register(redemption(), noop_handler()).await.unwrap();

    assert_eq!(manager.unsubscribe(&identity).await, Revocation::Confirmed);
    assert_eq!(manager.unsubscribe(&identity).await, Revocation::NotActive);

    let calls = stub.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].method, Method::DELETE);
    assert_eq!(calls[1].request.query_value("id"), Some("sub-1"));

    let outcome = manager
        .deliver(&identity, &redemption_payload("sub-1"))
        .await;
    assert_eq!(outcome, DeliveryOutcome::Discarded);
}

#[tokio::test]
async fn test_unsubscribe_fails_open() {
    let stub = Arc::new(StubGateway::new());
    stub.respond(redemption_created())
        .fail(Error::gateway(500, "Internal Server Error"));
    let manager = manager(&stub);
    let identity = redemption().identity().to_string();

    manager.register(redemption(), noop_handler()).await.unwrap();

    assert_eq!(manager.unsubscribe(&identity).await, Revocation::Unconfirmed);
    let instance = manager.instance(&identity).await.unwrap();
    assert_eq!(instance.state, SubscriptionState::Revoked);
    assert_eq!(instance.handlers, 0);
}

#[tokio::test]
async fn test_revoke_remote_marks_revoked() {
    let stub = Arc::new(StubGateway::new());
    stub.respond(redemption_created());
    let manager = manager(&stub);
    let identity = redemption().identity().to_string();

    manager.register(redemption(), noop_handler()).await.unwrap();

    assert!(manager.revoke_remote(&identity, "authorization_revoked").await);
    assert!(!manager.revoke_remote(&identity, "authorization_revoked").await);

    let instance = manager.instance(&identity).await.unwrap();
    assert_eq!(instance.state, SubscriptionState::Revoked);
    assert_eq!(
        instance.revocation_reason.as_deref(),
        Some("authorization_revoked")
    );
    assert_eq!(stub.call_count(), 1);
}

#[tokio::test]
async fn test_identity_for_payload() {
    let stub = Arc::new(StubGateway::new());
    stub.respond(redemption_created());
    let manager = manager(&stub);

    assert_eq!(
        manager.identity_for_payload(&stream_online_payload()).as_deref(),
        Some("stream.online.1337"),
        "falls back to type and condition"
    );
    assert_eq!(manager.identity_for_payload(&json!({"event": {}})), None);

    manager.register(redemption(), noop_handler()).await.unwrap();
    let payload = json!({"subscription": {"id": "sub-1"}});
    assert_eq!(
        manager.identity_for_payload(&payload).as_deref(),
        Some(redemption().identity())
    );
}

#[tokio::test]
async fn test_unsubscribe_all() {
    let stub = Arc::new(StubGateway::new());
    stub.respond(redemption_created())
        .respond(created(
            "sub-online",
            "stream.online",
            json!({"broadcaster_user_id": "1337"}),
        ))
        .respond(Value::Null)
        .respond(Value::Null);
    let manager = manager(&stub);
    let online = SubscriptionDescriptor::new(
        SubscriptionKind::StreamOnline,
        [("broadcaster_user_id", "1337")],
    )
    .unwrap();

    manager.register(redemption(), noop_handler()).await.unwrap();
    manager.register(online, noop_handler()).await.unwrap();
    assert_eq!(manager.active_identities().await.len(), 2);

    let results = manager.unsubscribe_all().await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, r)| *r == Revocation::Confirmed));
    assert!(manager.active_identities().await.is_empty());
}

// ============================================================================
// Webhook Receiver Tests
// ============================================================================

fn signed_request(
    message_type: &str,
    message_id: &str,
    timestamp: &str,
    body: &Value,
) -> Request<Body> {
    request_signed_with(SECRET, message_type, message_id, timestamp, body)
}

fn request_signed_with(
    secret: &str,
    message_type: &str,
    message_id: &str,
    timestamp: &str,
    body: &Value,
) -> Request<Body> {
    let bytes = serde_json::to_vec(body).unwrap();
    raw_request_signed_with(secret, message_type, message_id, timestamp, bytes)
}

fn raw_request_signed_with(
    secret: &str,
    message_type: &str,
    message_id: &str,
    timestamp: &str,
    bytes: Vec<u8>,
) -> Request<Body> {
    let signature = sign(secret, message_id, timestamp, &bytes).unwrap();
    Request::builder()
        .method("POST")
        .uri("/eventsub")
        .header("content-type", "application/json")
        .header(MESSAGE_ID_HEADER, message_id)
        .header(MESSAGE_TIMESTAMP_HEADER, timestamp)
        .header(MESSAGE_SIGNATURE_HEADER, signature)
        .header(MESSAGE_TYPE_HEADER, message_type)
        .body(Body::from(bytes))
        .unwrap()
}

async fn registered_router() -> (axum::Router, Arc<SubscriptionManager>, Arc<AtomicUsize>) {
    let stub = Arc::new(StubGateway::new());
    stub.respond(redemption_created());
    let manager = Arc::new(manager(&stub));
    let (handler, count) = counting_handler();
    manager.register(redemption(), handler).await.unwrap();

    let router = webhook::router(Arc::clone(&manager), SECRET, &ReceiverConfig::default());
    (router, manager, count)
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_webhook_answers_challenge() {
    let (router, _, _) = registered_router().await;
    let body = json!({
        "challenge": "pogchamp-kappa-360noscope-vohiyo",
        "subscription": {"id": "sub-1", "type": REDEMPTION_ADD, "version": "1"}
    });

    let response = router
        .oneshot(signed_request(
            "webhook_callback_verification",
            "m-1",
            &Utc::now().to_rfc3339(),
            &body,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/plain"
    );
    assert_eq!(body_text(response).await, "pogchamp-kappa-360noscope-vohiyo");
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let (router, _, count) = registered_router().await;
    let request = request_signed_with(
        "not-the-configured-secret",
        "notification",
        "m-1",
        &Utc::now().to_rfc3339(),
        &redemption_payload("sub-1"),
    );

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_webhook_rejects_stale_message() {
    let (router, _, count) = registered_router().await;
    let stale = (Utc::now() - ChronoDuration::minutes(11)).to_rfc3339();

    let response = router
        .oneshot(signed_request(
            "notification",
            "m-1",
            &stale,
            &redemption_payload("sub-1"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_webhook_delivers_once_per_message_id() {
    let (router, _, count) = registered_router().await;
    let timestamp = Utc::now().to_rfc3339();
    let payload = redemption_payload("sub-1");

    let response = router
        .clone()
        .oneshot(signed_request("notification", "m-1", &timestamp, &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(count.load(Ordering::SeqCst), 1);

    let response = router
        .oneshot(signed_request("notification", "m-1", &timestamp, &payload))
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert_eq!(count.load(Ordering::SeqCst), 1, "duplicate not re-delivered");
}

#[tokio::test]
async fn test_webhook_malformed_body_can_be_redelivered() {
    let (router, _, count) = registered_router().await;
    let timestamp = Utc::now().to_rfc3339();

    let response = router
        .clone()
        .oneshot(raw_request_signed_with(
            SECRET,
            "notification",
            "m-2",
            &timestamp,
            b"{\"subscription\":".to_vec(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(count.load(Ordering::SeqCst), 0);

    let response = router
        .oneshot(signed_request(
            "notification",
            "m-2",
            &timestamp,
            &redemption_payload("sub-1"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_webhook_revocation() {
    let (router, manager, _) = registered_router().await;
    let mut payload = redemption_payload("sub-1");
    payload["subscription"]["status"] = json!("authorization_revoked");
    payload.as_object_mut().unwrap().remove("event");

    let response = router
        .oneshot(signed_request(
            "revocation",
            "m-9",
            &Utc::now().to_rfc3339(),
            &payload,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let instance = manager.instance(redemption().identity()).await.unwrap();
    assert_eq!(instance.state, SubscriptionState::Revoked);
    assert_eq!(
        instance.revocation_reason.as_deref(),
        Some("authorization_revoked")
    );
}
