// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use corral_core::{FakeClock, SequentialIdGen};
use serde_json::json;

fn registry() -> (MessageRegistry, Arc<FakeClock>) {
    let clock = Arc::new(FakeClock::at(10_000));
    let registry = MessageRegistry::new(
        Store::open_in_memory().unwrap(),
        clock.clone(),
        Arc::new(SequentialIdGen::new("m")),
    );
    (registry, clock)
}

fn session() -> SessionId {
    SessionId::new("s-1")
}

#[test]
fn report_marks_needed_types_as_requiring_response() {
    let (registry, _) = registry();
    let msg = registry
        .report(&session(), "decision_needed", json!({"q": "which?"}))
        .unwrap();
    assert!(msg.message_type.requires_response());
    assert_eq!(msg.status, MessageStatus::Pending);

    let msg = registry
        .report(&session(), "progress_update", json!({"pct": 50}))
        .unwrap();
    assert!(!msg.message_type.requires_response());
}

#[test]
fn report_rejects_unknown_types() {
    let (registry, _) = registry();
    let err = registry.report(&session(), "telepathy", json!({})).unwrap_err();
    assert!(matches!(err, MessageError::UnknownMessageType(_)));
}

#[test]
fn respond_pairs_and_marks_responded() {
    let (registry, _) = registry();
    let msg = registry
        .report(&session(), "verification_needed", json!({}))
        .unwrap();
    let response = registry
        .respond(&session(), &msg.id, "verification_result", json!({"ok": true}))
        .unwrap();
    assert_eq!(response.in_response_to, msg.id);

    let (checkpoints, _) = registry.pending(None, None).unwrap();
    assert!(checkpoints.is_empty());
}

#[test]
fn respond_enforces_pairing_rules() {
    let (registry, _) = registry();
    let msg = registry
        .report(&session(), "decision_needed", json!({}))
        .unwrap();
    let err = registry
        .respond(&session(), &msg.id, "action_completed", json!({}))
        .unwrap_err();
    assert!(matches!(err, MessageError::InvalidPairing { .. }));

    // abort_task answers anything pending
    registry
        .respond(&session(), &msg.id, "abort_task", json!({}))
        .unwrap();
}

#[test]
fn respond_twice_is_rejected() {
    let (registry, _) = registry();
    let msg = registry
        .report(&session(), "action_needed", json!({}))
        .unwrap();
    registry
        .respond(&session(), &msg.id, "action_completed", json!({}))
        .unwrap();
    let err = registry
        .respond(&session(), &msg.id, "abort_task", json!({}))
        .unwrap_err();
    assert!(matches!(err, MessageError::AlreadyResponded(_)));
}

#[test]
fn respond_to_unknown_message_fails() {
    let (registry, _) = registry();
    let err = registry
        .respond(&session(), &MessageId::new("ghost"), "abort_task", json!({}))
        .unwrap_err();
    assert!(matches!(err, MessageError::MessageNotFound(_)));
}

#[tokio::test]
async fn await_returns_existing_response_immediately() {
    let (registry, _) = registry();
    let msg = registry
        .report(&session(), "decision_needed", json!({}))
        .unwrap();
    registry
        .respond(&session(), &msg.id, "decision_made", json!({"choice": 2}))
        .unwrap();

    let response = registry.await_response(&msg.id, Some(1_000)).await.unwrap();
    assert_eq!(response.response_type, ResponseType::DecisionMade);
    assert_eq!(response.payload["choice"], 2);
}

#[tokio::test]
async fn await_resolves_when_response_arrives_later() {
    let (registry, _) = registry();
    let msg = registry
        .report(&session(), "action_needed", json!({}))
        .unwrap();

    let waiter = {
        let registry = registry.clone();
        let id = msg.id.clone();
        tokio::spawn(async move { registry.await_response(&id, Some(10_000)).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(700)).await;
    registry
        .respond(&session(), &msg.id, "action_completed", json!({}))
        .unwrap();

    let response = waiter.await.unwrap().unwrap();
    assert_eq!(response.response_type, ResponseType::ActionCompleted);
}

#[tokio::test]
async fn await_timeout_expires_the_message() {
    let (registry, _) = registry();
    let msg = registry
        .report(&session(), "verification_needed", json!({}))
        .unwrap();

    let err = registry.await_response(&msg.id, Some(600)).await.unwrap_err();
    assert!(matches!(err, MessageError::MessageTimeout(_)));

    // Expiry is terminal: a late response is rejected
    let err = registry
        .respond(&session(), &msg.id, "verification_result", json!({}))
        .unwrap_err();
    assert!(matches!(err, MessageError::MessageExpired(_)));

    // And a second await reports expiry, not timeout
    let err = registry.await_response(&msg.id, Some(600)).await.unwrap_err();
    assert!(matches!(err, MessageError::MessageExpired(_)));
}

#[tokio::test]
async fn await_unknown_message_fails_fast() {
    let (registry, _) = registry();
    let err = registry
        .await_response(&MessageId::new("ghost"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, MessageError::MessageNotFound(_)));
}

#[test]
fn pending_splits_checkpoints_from_status_updates() {
    let (registry, _) = registry();
    registry
        .report(&session(), "progress_update", json!({"pct": 10}))
        .unwrap();
    registry
        .report(&session(), "decision_needed", json!({}))
        .unwrap();
    registry
        .report(&SessionId::new("s-2"), "task_completed", json!({}))
        .unwrap();

    let (checkpoints, updates) = registry.pending(None, None).unwrap();
    assert_eq!(checkpoints.len(), 1);
    assert_eq!(updates.len(), 2);

    let (checkpoints, updates) = registry.pending(Some(&session()), None).unwrap();
    assert_eq!(checkpoints.len(), 1);
    assert_eq!(updates.len(), 1);
}

#[test]
fn pending_expires_messages_past_hard_ttl() {
    let (registry, clock) = registry();
    registry
        .report(&session(), "decision_needed", json!({}))
        .unwrap();
    clock.advance_ms(300_001);

    let (checkpoints, updates) = registry.pending(None, None).unwrap();
    assert!(checkpoints.is_empty());
    assert!(updates.is_empty());
}
