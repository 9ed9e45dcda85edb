//! Slot accounting: exhaustion, reuse, and uniqueness.

use crate::prelude::*;
use corral_daemon::protocol::{Body, ErrorCode, Request, SessionFilter};

#[tokio::test]
async fn three_slots_fill_then_reject_then_reuse() {
    let spec = spec_with_slots(3);

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(spec.start("sleep 60").await);
    }

    // Slots 1..3 assigned, each exactly once
    let reply = spec
        .request(Request::ListSessions {
            filter: SessionFilter::Running,
        })
        .await;
    let sessions = match reply.body {
        Some(Body::Sessions { sessions, free_slots }) => {
            assert_eq!(free_slots, 0);
            sessions
        }
        other => panic!("unexpected body: {other:?}"),
    };
    let mut slots: Vec<u32> = sessions.iter().map(|s| s.slot).collect();
    slots.sort_unstable();
    assert_eq!(slots, [1, 2, 3]);

    // Fourth start is rejected with the documented error
    let reply = spec
        .request(Request::StartSession {
            working_dir: spec.project(),
            command: Some("sleep 60".to_string()),
        })
        .await;
    assert!(!reply.success);
    assert_eq!(reply.code, Some(ErrorCode::SlotsExhausted));
    assert_eq!(
        reply.error.as_deref(),
        Some("All 3 session slots are occupied")
    );

    // Ending one frees its slot; the next session reuses the number with a
    // fresh id
    let ended = ids[1].clone();
    let ended_slot = sessions
        .iter()
        .find(|s| s.id.as_str() == ended)
        .map(|s| s.slot)
        .unwrap();
    spec.request(Request::EndSession { id: ended.clone() }).await;
    spec.wait_until_ended(&ended).await;

    let replacement = spec.start("sleep 60").await;
    assert_ne!(replacement, ended);
    let row = spec
        .daemon
        .store
        .find_session(&replacement)
        .unwrap()
        .unwrap();
    assert_eq!(row.slot, ended_slot);
}

#[tokio::test]
async fn ended_sessions_keep_their_history() {
    let spec = spec();
    let id = spec.start("echo remembered").await;
    spec.wait_until_ended(&id).await;

    let text = spec.output_text(&id).await;
    assert!(text.contains("remembered"));

    let reply = spec
        .request(Request::ListSessions {
            filter: SessionFilter::Completed,
        })
        .await;
    match reply.body {
        Some(Body::Sessions { sessions, .. }) => {
            assert_eq!(sessions.len(), 1);
            assert!(sessions[0].ended_at_ms.is_some());
        }
        other => panic!("unexpected body: {other:?}"),
    }
}
